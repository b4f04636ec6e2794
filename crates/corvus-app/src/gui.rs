use corvus_render::renderer::Renderer;
use imgui_winit_support::{HiDpiMode, WinitPlatform};

/// imgui overlay 的前端：context + winit 平台集成 + 每帧的窗口内容
///
/// overlay 读取引擎暴露的统计数据，并允许修改背景效果和日光参数；
/// 实际的绘制由引擎的 UI pass 完成
pub struct Gui {
    pub imgui: imgui::Context,
    platform: WinitPlatform,
}

// init
impl Gui {
    pub fn new(window: &winit::window::Window) -> Self {
        let mut imgui = imgui::Context::create();
        // 不自动写 .ini 文件
        imgui.set_ini_filename(None);

        let mut platform = WinitPlatform::new(&mut imgui);
        platform.attach_window(imgui.io_mut(), window, HiDpiMode::Rounded);

        let hidpi_factor = platform.hidpi_factor();
        let font_size = (13.0 * hidpi_factor) as f32;
        imgui.fonts().add_font(&[imgui::FontSource::DefaultFontData {
            config: Some(imgui::FontConfig {
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);
        imgui.io_mut().font_global_scale = (1.0 / hidpi_factor) as f32;

        Self { imgui, platform }
    }
}

// 事件与每帧驱动
impl Gui {
    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        window_id: winit::window::WindowId,
        event: &winit::event::WindowEvent,
    ) {
        let event = winit::event::Event::<()>::WindowEvent {
            window_id,
            event: event.clone(),
        };
        self.platform.handle_event(self.imgui.io_mut(), window, &event);
    }

    pub fn handle_device_event(
        &mut self,
        window: &winit::window::Window,
        device_id: winit::event::DeviceId,
        event: &winit::event::DeviceEvent,
    ) {
        let event = winit::event::Event::<()>::DeviceEvent {
            device_id,
            event: event.clone(),
        };
        self.platform.handle_event(self.imgui.io_mut(), window, &event);
    }

    /// 构建本帧的 overlay 内容，返回编译好的 draw data
    pub fn frame(
        &mut self,
        window: &winit::window::Window,
        renderer: &mut Renderer,
        delta: std::time::Duration,
    ) -> &imgui::DrawData {
        self.imgui.io_mut().update_delta_time(delta);
        self.platform.prepare_frame(self.imgui.io_mut(), window).unwrap();

        let ui = self.imgui.new_frame();

        ui.window("Stats").build(|| {
            ui.text(format!("frametime {:.3} ms", renderer.stats.frametime_ms));
            ui.text(format!("drawtime {:.3} ms", renderer.stats.mesh_draw_time_ms));
            ui.text(format!("triangles {}", renderer.stats.triangle_count));
            ui.text(format!("draws {}", renderer.stats.drawcall_count));
        });

        ui.window("Background").build(|| {
            let background = &mut renderer.background;
            if background.effects.is_empty() {
                ui.text("no background effects available");
            } else {
                let max_index = background.effects.len() as i32 - 1;
                let mut index = background.current as i32;
                ui.text(format!("Selected effect: {}", background.effects[background.current].name));
                ui.slider("Effect Index", 0, max_index, &mut index);
                background.current = index.clamp(0, max_index) as usize;

                let data = &mut background.effects[background.current].data;
                let mut edit_vec4 = |label: &str, value: &mut glam::Vec4| {
                    let mut array = value.to_array();
                    if ui.input_float4(label, &mut array).build() {
                        *value = glam::Vec4::from_array(array);
                    }
                };
                edit_vec4("data1", &mut data.data1);
                edit_vec4("data2", &mut data.data2);
                edit_vec4("data3", &mut data.data3);
                edit_vec4("data4", &mut data.data4);
            }

            let mut edit_scene_vec4 = |label: &str, value: &mut glam::Vec4| {
                let mut array = value.to_array();
                if ui.input_float4(label, &mut array).build() {
                    *value = glam::Vec4::from_array(array);
                }
            };
            edit_scene_vec4("Sunlight Color", &mut renderer.scene_data.sunlight_color);
            edit_scene_vec4("Sunlight Direction", &mut renderer.scene_data.sunlight_direction);
        });

        self.platform.prepare_render(ui, window);
        self.imgui.render()
    }
}
