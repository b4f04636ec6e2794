use std::time::Instant;

use corvus_render::renderer::Renderer;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::ActiveEventLoop,
    window::{Window, WindowId},
};

use crate::{camera::Camera, config::AppConfig, gui::Gui};

struct AppState {
    renderer: Renderer,
    gui: Gui,
    camera: Camera,
    last_frame: Instant,
}

/// 外层驱动：窗口生命周期、输入分发、每帧的 resize 检查与绘制
pub struct CorvusApp {
    config: AppConfig,
    window: Option<Window>,
    state: Option<AppState>,
}

impl CorvusApp {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            window: None,
            state: None,
        }
    }

    fn run_frame(&mut self) {
        let (Some(window), Some(state)) = (&self.window, &mut self.state) else {
            return;
        };

        // 最小化时整个循环冻结，不触碰 resize 标记
        if state.renderer.freeze_rendering {
            std::thread::sleep(std::time::Duration::from_millis(100));
            return;
        }

        let start = Instant::now();

        // resize 是延迟处理的：只在帧间隙、draw 之前
        if state.renderer.resize_requested {
            state.renderer.resize_swapchain(window);
        }

        let delta = start - state.last_frame;
        state.last_frame = start;

        let AppState {
            renderer,
            gui,
            camera,
            ..
        } = state;

        camera.update();
        renderer.update_scene(camera.view_matrix());

        let draw_data = gui.frame(window, renderer, delta);
        renderer.draw(Some(draw_data));

        renderer.stats.frametime_ms = start.elapsed().as_secs_f32() * 1000.0;
    }
}

impl ApplicationHandler for CorvusApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("Corvus")
            .with_inner_size(PhysicalSize::new(self.config.window_width, self.config.window_height));
        let window = event_loop.create_window(attributes).unwrap();

        let mut renderer = Renderer::new(&window);
        let mut gui = Gui::new(&window);
        renderer.init_ui(&mut gui.imgui);

        if let Some(scene_path) = self.config.scene_path.clone() {
            renderer.load_scene("structure", &scene_path);
        }
        for model_path in self.config.model_paths.clone() {
            renderer.load_model(&model_path);
        }

        self.state = Some(AppState {
            renderer,
            gui,
            camera: Camera::default(),
            last_frame: Instant::now(),
        });
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let (Some(window), Some(state)) = (&self.window, &mut self.state) else {
            return;
        };

        state.gui.handle_window_event(window, window_id, &event);
        state.camera.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                if let Some(state) = self.state.take() {
                    state.renderer.destroy();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                // 0×0 意味着最小化
                state.renderer.freeze_rendering = size.width == 0 || size.height == 0;
            }
            WindowEvent::RedrawRequested => {
                self.run_frame();
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, device_id: DeviceId, event: DeviceEvent) {
        let (Some(window), Some(state)) = (&self.window, &mut self.state) else {
            return;
        };
        state.gui.handle_device_event(window, device_id, &event);
        state.camera.handle_device_event(&event);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
