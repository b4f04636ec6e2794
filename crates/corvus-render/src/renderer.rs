use std::{collections::HashMap, ffi::CStr, path::Path, rc::Rc};

use ash::vk;
use corvus_gfx::{
    commands::command_buffer::GfxCommandBuffer,
    descriptors::{
        allocator::{DescriptorAllocator, DescriptorAllocatorGrowable, PoolSizeRatio},
        layout_builder::DescriptorLayoutBuilder,
        writer::DescriptorWriter,
    },
    gfx::Gfx,
    pipelines::{graphics_pipeline::PipelineBuilder, shader::ShaderModule},
    resources::{buffer::GfxBuffer, image::GfxImage},
    swapchain::render_swapchain::RenderSwapchain,
};

use crate::{
    background::BackgroundEffects,
    deletion_queue::{DeferredDestroy, DeletionQueue},
    draw_list::{cull_opaque, sort_opaque},
    frame::{FrameSlot, FRAME_OVERLAP},
    framebuffers::FrameTargets,
    gltf_scene::{load_gltf, LoadedScene, SceneDefaults},
    material::{MaterialConstants, MaterialInstance, MaterialPass, MaterialResources, MetallicRoughness},
    model_upload::UploadedModel,
    scene::{DrawContext, GPUDrawPushConstants, GPUMeshBuffers, GPUSceneData, RenderObject, Vertex},
    stats::EngineStats,
    ui_pass::UiPass,
    upload::upload_mesh,
};

/// 把 offscreen 渲染结果全屏变换进 post-process image 的 pass
struct PostProcessPass {
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    set_layout: vk::DescriptorSetLayout,
    descriptor_set: vk::DescriptorSet,
}

/// 渲染引擎
///
/// 单 CPU 线程驱动所有录制和提交；CPU/GPU 的并行由 frame slot 的
/// fence/semaphore 编排，double buffering 限制 CPU 最多领先一帧
pub struct Renderer {
    gfx: Gfx,
    swapchain: RenderSwapchain,

    frames: Vec<FrameSlot>,
    frame_number: usize,

    global_deletion_queue: DeletionQueue,

    global_descriptor_allocator: DescriptorAllocator,
    /// 持久 material set 的来源（default material 等）
    material_descriptor_allocator: DescriptorAllocatorGrowable,

    targets: FrameTargets,
    draw_extent: vk::Extent2D,
    pub render_scale: f32,

    draw_image_layout: vk::DescriptorSetLayout,
    draw_image_descriptors: vk::DescriptorSet,
    scene_data_layout: vk::DescriptorSetLayout,

    pub background: BackgroundEffects,
    post_process: Option<PostProcessPass>,
    ui_pass: Option<UiPass>,

    metal_rough_material: Option<MetallicRoughness>,

    white_image: GfxImage,
    grey_image: GfxImage,
    black_image: GfxImage,
    error_checkerboard_image: GfxImage,
    default_sampler_linear: vk::Sampler,
    default_sampler_nearest: vk::Sampler,
    default_material_constants: GfxBuffer,
    pub default_material: Option<Rc<MaterialInstance>>,
    /// post-process 全屏 quad
    rectangle: GPUMeshBuffers,

    pub scene_data: GPUSceneData,
    draw_context: DrawContext,
    pub loaded_scenes: HashMap<String, LoadedScene>,
    pub imported_models: Vec<UploadedModel>,

    pub stats: EngineStats,

    /// swapchain 过期，外层循环在下一帧开始前重建
    pub resize_requested: bool,
    /// 窗口最小化时外层循环完全冻结，不触碰 resize 标记
    pub freeze_rendering: bool,
}

// init
impl Renderer {
    pub fn new(window: &winit::window::Window) -> Self {
        use raw_window_handle::HasDisplayHandle;

        let surface_exts = ash_window::enumerate_required_extensions(window.display_handle().unwrap().as_raw())
            .unwrap()
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(*ext) })
            .collect::<Vec<_>>();

        let gfx = Gfx::new("Corvus", surface_exts);
        let swapchain = RenderSwapchain::new(&gfx, window);
        let window_extent = swapchain.extent();

        let frames = (0..FRAME_OVERLAP).map(|i| FrameSlot::new(&gfx, i)).collect::<Vec<_>>();

        let targets = FrameTargets::new(&gfx, window_extent);

        let mut global_deletion_queue = DeletionQueue::new();

        // global descriptors
        let mut global_descriptor_allocator = DescriptorAllocator::new(
            &gfx,
            100,
            &[
                PoolSizeRatio {
                    descriptor_type: vk::DescriptorType::STORAGE_IMAGE,
                    ratio: 3.0,
                },
                PoolSizeRatio {
                    descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
                    ratio: 3.0,
                },
                PoolSizeRatio {
                    descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    ratio: 3.0,
                },
            ],
        );
        let mut material_descriptor_allocator = DescriptorAllocatorGrowable::new(
            &gfx,
            4,
            vec![
                PoolSizeRatio {
                    descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                    ratio: 1.0,
                },
                PoolSizeRatio {
                    descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    ratio: 2.0,
                },
            ],
        );

        let draw_image_layout = DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::STORAGE_IMAGE)
            .build(&gfx, vk::ShaderStageFlags::COMPUTE);
        let scene_data_layout = DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER)
            .build(&gfx, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
        global_deletion_queue.push(DeferredDestroy::DescriptorSetLayout(draw_image_layout));
        global_deletion_queue.push(DeferredDestroy::DescriptorSetLayout(scene_data_layout));

        let draw_image_descriptors = global_descriptor_allocator.allocate(&gfx, draw_image_layout);
        DescriptorWriter::new()
            .write_image(
                0,
                targets.draw_image.view(),
                vk::Sampler::null(),
                vk::ImageLayout::GENERAL,
                vk::DescriptorType::STORAGE_IMAGE,
            )
            .update_set(&gfx, draw_image_descriptors);

        // pipelines
        let background = BackgroundEffects::new(&gfx, draw_image_layout);

        let mut metal_rough_material = match MetallicRoughness::build_pipelines(
            &gfx,
            scene_data_layout,
            FrameTargets::COLOR_FORMAT,
            FrameTargets::DEPTH_FORMAT,
            &mut global_deletion_queue,
        ) {
            Ok(material) => Some(material),
            Err(e) => {
                log::error!("metallic-roughness material unavailable, scene rendering disabled: {e:#}");
                None
            }
        };

        // default data
        let rectangle = Self::upload_rectangle(&gfx);

        let one_pixel = |color: u32| bytemuck::bytes_of(&color).to_vec();
        let white = one_pixel(0xFFFF_FFFF);
        let grey = one_pixel(0xFFAA_AAAA);
        let black = one_pixel(0xFF00_0000);

        let extent_1x1 = vk::Extent3D {
            width: 1,
            height: 1,
            depth: 1,
        };
        let white_image = crate::upload::upload_image(
            &gfx,
            &white,
            extent_1x1,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::SAMPLED,
            false,
            "white",
        );
        let grey_image = crate::upload::upload_image(
            &gfx,
            &grey,
            extent_1x1,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::SAMPLED,
            false,
            "grey",
        );
        let black_image = crate::upload::upload_image(
            &gfx,
            &black,
            extent_1x1,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::SAMPLED,
            false,
            "black",
        );

        // 16x16 的 magenta/black 棋盘格，用作缺失纹理的显眼兜底
        let magenta = 0xFFFF_00FFu32;
        let mut checkerboard = Vec::with_capacity(16 * 16 * 4);
        for y in 0..16 {
            for x in 0..16 {
                let color = if ((x % 2) ^ (y % 2)) == 1 { magenta } else { 0xFF00_0000 };
                checkerboard.extend_from_slice(bytemuck::bytes_of(&color));
            }
        }
        let error_checkerboard_image = crate::upload::upload_image(
            &gfx,
            &checkerboard,
            vk::Extent3D {
                width: 16,
                height: 16,
                depth: 1,
            },
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::SAMPLED,
            false,
            "error-checkerboard",
        );

        let nearest_ci = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::NEAREST)
            .min_filter(vk::Filter::NEAREST);
        let linear_ci = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR);
        let default_sampler_nearest = unsafe { gfx.device().create_sampler(&nearest_ci, None).unwrap() };
        let default_sampler_linear = unsafe { gfx.device().create_sampler(&linear_ci, None).unwrap() };
        global_deletion_queue.push(DeferredDestroy::Sampler(default_sampler_nearest));
        global_deletion_queue.push(DeferredDestroy::Sampler(default_sampler_linear));

        let default_material_constants = GfxBuffer::new(
            &gfx,
            std::mem::size_of::<MaterialConstants>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            true,
            "default-material-constants",
        );
        default_material_constants.transfer_data_by_mmap(&gfx, &[MaterialConstants::default()]);

        let default_material = metal_rough_material.as_mut().map(|metal_rough| {
            Rc::new(metal_rough.write_material(
                &gfx,
                MaterialPass::Opaque,
                &MaterialResources {
                    color_image_view: white_image.view(),
                    color_sampler: default_sampler_linear,
                    metal_rough_image_view: white_image.view(),
                    metal_rough_sampler: default_sampler_nearest,
                    data_buffer: default_material_constants.vk_buffer(),
                    data_buffer_offset: 0,
                },
                &mut material_descriptor_allocator,
            ))
        });

        let post_process = Self::build_post_process_pass(&gfx, &targets, &mut global_descriptor_allocator);

        let mut scene_data = GPUSceneData::default();
        scene_data.ambient_color = glam::vec4(0.1, 0.1, 0.1, 1.0);
        scene_data.sunlight_color = glam::Vec4::ONE;
        scene_data.sunlight_direction = glam::vec4(0.0, 1.0, 0.5, 1.0);

        Self {
            gfx,
            swapchain,
            frames,
            frame_number: 0,
            global_deletion_queue,
            global_descriptor_allocator,
            material_descriptor_allocator,
            targets,
            draw_extent: window_extent,
            render_scale: 1.0,
            draw_image_layout,
            draw_image_descriptors,
            scene_data_layout,
            background,
            post_process,
            ui_pass: None,
            metal_rough_material,
            white_image,
            grey_image,
            black_image,
            error_checkerboard_image,
            default_sampler_linear,
            default_sampler_nearest,
            default_material_constants,
            default_material,
            rectangle,
            scene_data,
            draw_context: DrawContext::default(),
            loaded_scenes: HashMap::new(),
            imported_models: Vec::new(),
            stats: EngineStats::default(),
            resize_requested: false,
            freeze_rendering: false,
        }
    }

    /// post-process 用的全屏 quad
    fn upload_rectangle(gfx: &Gfx) -> GPUMeshBuffers {
        let mut rect_vertices = [Vertex::default(); 4];
        rect_vertices[0].position = glam::vec3(1.0, -1.0, 0.0);
        rect_vertices[1].position = glam::vec3(1.0, 1.0, 0.0);
        rect_vertices[2].position = glam::vec3(-1.0, -1.0, 0.0);
        rect_vertices[3].position = glam::vec3(-1.0, 1.0, 0.0);

        rect_vertices[0].uv_x = 1.0;
        rect_vertices[0].uv_y = 0.0;
        rect_vertices[1].uv_x = 0.0;
        rect_vertices[1].uv_y = 0.0;
        rect_vertices[2].uv_x = 1.0;
        rect_vertices[2].uv_y = 1.0;
        rect_vertices[3].uv_x = 0.0;
        rect_vertices[3].uv_y = 1.0;

        let rect_indices = [0u32, 1, 2, 2, 1, 3];

        upload_mesh(gfx, &rect_indices, &rect_vertices)
    }

    fn build_post_process_pass(
        gfx: &Gfx,
        targets: &FrameTargets,
        global_descriptor_allocator: &mut DescriptorAllocator,
    ) -> Option<PostProcessPass> {
        let vertex_shader = match ShaderModule::load(gfx, Path::new("assets/shaders/screen_texture.vert.spv")) {
            Ok(m) => m,
            Err(e) => {
                log::error!("post-process pass unavailable: {e:#}");
                return None;
            }
        };
        let fragment_shader = match ShaderModule::load(gfx, Path::new("assets/shaders/screen_texture.frag.spv")) {
            Ok(m) => m,
            Err(e) => {
                log::error!("post-process pass unavailable: {e:#}");
                vertex_shader.destroy(gfx);
                return None;
            }
        };

        let set_layout = DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER)
            .add_binding(1, vk::DescriptorType::STORAGE_IMAGE)
            .build(gfx, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);

        let descriptor_set = global_descriptor_allocator.allocate(gfx, set_layout);
        DescriptorWriter::new()
            .write_image(
                1,
                targets.draw_image.view(),
                vk::Sampler::null(),
                vk::ImageLayout::GENERAL,
                vk::DescriptorType::STORAGE_IMAGE,
            )
            .update_set(gfx, descriptor_set);

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .offset(0)
            .size(std::mem::size_of::<GPUDrawPushConstants>() as u32);
        let layout_ci = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(std::slice::from_ref(&set_layout))
            .push_constant_ranges(std::slice::from_ref(&push_constant_range));
        let pipeline_layout = unsafe { gfx.device().create_pipeline_layout(&layout_ci, None).unwrap() };

        let pipeline = PipelineBuilder::new()
            .set_shaders(vertex_shader.handle(), fragment_shader.handle())
            .set_input_topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .set_polygon_mode(vk::PolygonMode::FILL)
            .set_cull_mode(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE)
            .set_multisampling_none()
            .disable_blending()
            .disable_depthtest()
            .set_color_attachment_format(FrameTargets::COLOR_FORMAT)
            .set_pipeline_layout(pipeline_layout)
            .build(gfx);

        vertex_shader.destroy(gfx);
        fragment_shader.destroy(gfx);

        let Some(pipeline) = pipeline else {
            unsafe {
                gfx.device().destroy_pipeline_layout(pipeline_layout, None);
                gfx.device().destroy_descriptor_set_layout(set_layout, None);
            }
            log::error!("post-process pass unavailable: pipeline creation failed");
            return None;
        };

        Some(PostProcessPass {
            pipeline,
            pipeline_layout,
            set_layout,
            descriptor_set,
        })
    }

    /// UI overlay 需要 imgui context，由外层在引擎创建后注入
    pub fn init_ui(&mut self, imgui_ctx: &mut imgui::Context) {
        match UiPass::new(
            &self.gfx,
            imgui_ctx,
            self.swapchain.color_format(),
            &mut self.global_descriptor_allocator,
        ) {
            Ok(ui_pass) => self.ui_pass = Some(ui_pass),
            Err(e) => log::error!("ui overlay unavailable: {e:#}"),
        }
    }
}

// 资源加载入口
impl Renderer {
    /// 加载一个 glTF 场景到 name → scene 映射
    ///
    /// 失败时记录日志，场景缺席，引擎继续运行
    pub fn load_scene(&mut self, name: &str, path: impl AsRef<Path>) {
        let Some(metal_rough) = self.metal_rough_material.as_mut() else {
            log::error!("cannot load scene {:?}: material system unavailable", name);
            return;
        };

        let defaults = SceneDefaults {
            white_view: self.white_image.view(),
            error_view: self.error_checkerboard_image.view(),
            linear_sampler: self.default_sampler_linear,
        };

        match load_gltf(&self.gfx, metal_rough, defaults, path.as_ref()) {
            Ok(scene) => {
                self.loaded_scenes.insert(name.to_string(), scene);
            }
            Err(e) => log::error!("failed to load scene {:?} from {:?}: {e:#}", name, path.as_ref()),
        }
    }

    /// 加载一个 OBJ 模型并上传
    pub fn load_model(&mut self, path: impl AsRef<Path>) {
        let Some(metal_rough) = self.metal_rough_material.as_mut() else {
            log::error!("cannot load model {:?}: material system unavailable", path.as_ref());
            return;
        };

        let model = match corvus_model::Model::load(path.as_ref()) {
            Ok(model) => model,
            Err(e) => {
                log::error!("failed to load model {:?}: {e:#}", path.as_ref());
                return;
            }
        };

        let uploaded = UploadedModel::upload(
            &self.gfx,
            metal_rough,
            &model,
            self.white_image.view(),
            self.error_checkerboard_image.view(),
            self.default_sampler_linear,
        );
        self.imported_models.push(uploaded);
    }
}

// 每帧驱动
impl Renderer {
    /// 由外层每帧调用：以当前相机视图重建 draw context
    pub fn update_scene(&mut self, view: glam::Mat4) {
        self.draw_context.clear();

        let aspect = self.draw_extent.width as f32 / self.draw_extent.height.max(1) as f32;
        // reversed-Z：near/far 倒置，远处的深度趋近 0
        let mut projection = glam::Mat4::perspective_rh(70f32.to_radians(), aspect, 10000.0, 0.1);
        // glTF/OpenGL 风格的 Y 翻转
        projection.y_axis.y *= -1.0;

        self.scene_data.view = view;
        self.scene_data.proj = projection;
        self.scene_data.viewproj = projection * view;

        let Self {
            loaded_scenes,
            imported_models,
            draw_context,
            ..
        } = self;

        for scene in loaded_scenes.values() {
            scene.draw(&glam::Mat4::IDENTITY, draw_context);
        }
        // 外部导入的模型走同一条 render-object 路径：
        // 每个 mesh 带着自己的 material，不会借用别人的 pipeline
        for model in imported_models.iter() {
            model.draw(&glam::Mat4::IDENTITY, draw_context);
        }
    }

    /// 渲染并 present 一帧
    ///
    /// 状态机：WaitPrevious → AcquireImage → Record → Submit → Present。
    /// swapchain 过期时设置 resize_requested 并放弃当前帧，不在帧内重试
    pub fn draw(&mut self, ui_draw_data: Option<&imgui::DrawData>) {
        let frame_index = self.frame_number % FRAME_OVERLAP;

        // WaitPrevious：fence 返回后，这个 slot 的资源才允许回收/复用
        self.frames[frame_index].render_fence.wait();
        {
            let Self { frames, gfx, .. } = self;
            let frame = &mut frames[frame_index];
            frame.deletion_queue.flush(gfx);
            frame.frame_descriptors.clear_pools(gfx);
        }

        // AcquireImage：1 秒超时；过期时放弃本帧而不是原地重试
        let acquire_result =
            self.swapchain.acquire_next_image(&self.frames[frame_index].swapchain_semaphore, 1_000_000_000);
        let swapchain_image_index = match acquire_result {
            Ok(index) => index,
            Err(_) => {
                self.resize_requested = true;
                return;
            }
        };

        self.draw_extent = vk::Extent2D {
            width: (u32::min(self.swapchain.extent().width, self.targets.draw_image.width()) as f32
                * self.render_scale) as u32,
            height: (u32::min(self.swapchain.extent().height, self.targets.draw_image.height()) as f32
                * self.render_scale) as u32,
        };

        self.frames[frame_index].render_fence.reset();

        // Record
        let cmd = self.frames[frame_index].main_command_buffer.clone();
        cmd.reset();
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        let draw_image = self.targets.draw_image.handle();
        let depth_image = self.targets.depth_image.handle();
        let post_process_image = self.targets.post_process_image.handle();
        let swapchain_image = self.swapchain.image(swapchain_image_index);

        // (a) offscreen 目标进入可写 layout；上一帧的内容全部丢弃
        cmd.transition_image(draw_image, vk::ImageLayout::UNDEFINED, vk::ImageLayout::GENERAL);
        cmd.transition_image(depth_image, vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL);

        // (b) compute 背景
        self.background.record(&cmd, self.draw_image_descriptors, self.draw_extent);

        // (c) geometry pass
        cmd.transition_image(draw_image, vk::ImageLayout::GENERAL, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let mesh_draw_start = std::time::Instant::now();
        self.record_geometry_pass(&cmd, frame_index);
        self.stats.mesh_draw_time_ms = mesh_draw_start.elapsed().as_secs_f32() * 1000.0;

        // (d) post-process：geometry 结果回到 GENERAL 供 storage 读取
        cmd.transition_image(draw_image, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::GENERAL);
        cmd.transition_image(
            post_process_image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        self.record_post_process_pass(&cmd);

        // (e) post-process 结果 blit 进 swapchain image（尺寸不同时缩放）
        cmd.transition_image(
            post_process_image,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );
        cmd.transition_image(swapchain_image, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        cmd.copy_image_to_image(post_process_image, swapchain_image, self.draw_extent, self.swapchain.extent());

        // (f) UI overlay 直接画进 swapchain image
        cmd.transition_image(
            swapchain_image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        if let Some(draw_data) = ui_draw_data {
            let Self {
                frames,
                gfx,
                swapchain,
                ui_pass,
                ..
            } = &mut *self;
            if let Some(ui_pass) = ui_pass {
                ui_pass.draw(
                    gfx,
                    &cmd,
                    &mut frames[frame_index].deletion_queue,
                    draw_data,
                    swapchain.image_view(swapchain_image_index),
                    swapchain.extent(),
                );
            }
        }

        // (g) present layout
        cmd.transition_image(
            swapchain_image,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );

        cmd.end();

        // Submit：等 image-acquired，signal render-complete + fence
        let frame = &self.frames[frame_index];
        let submit_info = corvus_gfx::commands::submit_info::GfxSubmitInfo::new(std::slice::from_ref(&cmd))
            .wait(&frame.swapchain_semaphore, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .signal(&frame.render_semaphore, vk::PipelineStageFlags2::ALL_GRAPHICS);
        self.gfx.gfx_queue().submit(vec![submit_info], Some(&frame.render_fence));

        // Present：OUT_OF_DATE 时这一帧仍然算完成
        if self
            .swapchain
            .present_image(self.gfx.gfx_queue(), &frame.render_semaphore, swapchain_image_index)
            .is_err()
        {
            self.resize_requested = true;
        }

        self.frame_number += 1;
    }

    /// geometry pass：裁剪 + 排序后的 draw list 提交
    fn record_geometry_pass(&mut self, cmd: &GfxCommandBuffer, frame_index: usize) {
        let Self {
            gfx,
            frames,
            draw_context,
            scene_data,
            scene_data_layout,
            targets,
            draw_extent,
            stats,
            ..
        } = self;
        let frame = &mut frames[frame_index];

        stats.drawcall_count = 0;
        stats.triangle_count = 0;

        // 本帧的 scene uniform buffer：用完即弃，挂在 slot 的 deletion queue 上
        let scene_buffer = GfxBuffer::new(
            gfx,
            std::mem::size_of::<GPUSceneData>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            true,
            "scene-data",
        );
        scene_buffer.transfer_data_by_mmap(gfx, std::slice::from_ref(scene_data));

        let global_descriptor = frame.frame_descriptors.allocate(gfx, *scene_data_layout);
        DescriptorWriter::new()
            .write_buffer(
                0,
                scene_buffer.vk_buffer(),
                std::mem::size_of::<GPUSceneData>() as vk::DeviceSize,
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
            )
            .update_set(gfx, global_descriptor);
        frame.deletion_queue.push(DeferredDestroy::Buffer(scene_buffer));

        // 裁剪 + 排序
        let mut opaque_draws = cull_opaque(draw_context, &scene_data.viewproj);
        sort_opaque(draw_context, &mut opaque_draws);

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(targets.draw_image.view())
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE);
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(targets.depth_image.view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                // reversed-Z：清到 0
                depth_stencil: vk::ClearDepthStencilValue { depth: 0.0, stencil: 0 },
            });
        let render_info = vk::RenderingInfo::default()
            .render_area((*draw_extent).into())
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        cmd.cmd_begin_rendering(&render_info);

        cmd.cmd_set_viewport(
            0,
            &[vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: draw_extent.width as f32,
                height: draw_extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );
        cmd.cmd_set_scissor(
            0,
            &[vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: *draw_extent,
            }],
        );

        // 只在真正变化时重绑定 pipeline / material set / index buffer
        let mut last_pipeline = vk::Pipeline::null();
        let mut last_material: *const MaterialInstance = std::ptr::null();
        let mut last_index_buffer = vk::Buffer::null();

        let mut draw_object = |render_object: &RenderObject| {
            let material = render_object.material.as_ref();

            if !std::ptr::eq(last_material, material) {
                last_material = material;

                if material.pipeline.pipeline != last_pipeline {
                    last_pipeline = material.pipeline.pipeline;
                    cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, material.pipeline.pipeline);
                    cmd.cmd_bind_descriptor_sets(
                        vk::PipelineBindPoint::GRAPHICS,
                        material.pipeline.layout,
                        0,
                        std::slice::from_ref(&global_descriptor),
                    );
                }

                cmd.cmd_bind_descriptor_sets(
                    vk::PipelineBindPoint::GRAPHICS,
                    material.pipeline.layout,
                    1,
                    std::slice::from_ref(&material.material_set),
                );
            }

            if render_object.index_buffer != last_index_buffer {
                last_index_buffer = render_object.index_buffer;
                cmd.cmd_bind_index_buffer(render_object.index_buffer, 0, vk::IndexType::UINT32);
            }

            let push_constants =
                GPUDrawPushConstants::new(render_object.transform, render_object.vertex_buffer_address);
            cmd.cmd_push_constants(
                material.pipeline.layout,
                vk::ShaderStageFlags::VERTEX,
                0,
                bytemuck::bytes_of(&push_constants),
            );

            stats.drawcall_count += 1;
            stats.triangle_count += render_object.index_count / 3;
            cmd.cmd_draw_indexed(render_object.index_count, 1, render_object.first_index, 0, 0);
        };

        for index in opaque_draws {
            draw_object(&draw_context.opaque_surfaces[index]);
        }
        // transparent 列表不裁剪不排序，按提交顺序画
        for render_object in &draw_context.transparent_surfaces {
            draw_object(render_object);
        }

        cmd.cmd_end_rendering();

        // draw context 每帧重建，提交完即清空
        draw_context.clear();
    }

    /// post-process pass：全屏 quad 把 draw image 变换进 post-process image
    fn record_post_process_pass(&self, cmd: &GfxCommandBuffer) {
        let Some(post_process) = &self.post_process else {
            return;
        };

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.targets.post_process_image.view())
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE);
        let render_info = vk::RenderingInfo::default()
            .render_area(self.draw_extent.into())
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment));

        cmd.cmd_begin_rendering(&render_info);
        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, post_process.pipeline);
        cmd.cmd_bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            post_process.pipeline_layout,
            0,
            std::slice::from_ref(&post_process.descriptor_set),
        );

        cmd.cmd_set_viewport(
            0,
            &[vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: self.draw_extent.width as f32,
                height: self.draw_extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );
        cmd.cmd_set_scissor(
            0,
            &[vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: self.draw_extent,
            }],
        );

        let push_constants =
            GPUDrawPushConstants::new(glam::Mat4::IDENTITY, self.rectangle.vertex_buffer_address);
        cmd.cmd_push_constants(
            post_process.pipeline_layout,
            vk::ShaderStageFlags::VERTEX,
            0,
            bytemuck::bytes_of(&push_constants),
        );
        cmd.cmd_bind_index_buffer(self.rectangle.index_buffer.vk_buffer(), 0, vk::IndexType::UINT32);
        cmd.cmd_draw_indexed(6, 1, 0, 0, 0);

        cmd.cmd_end_rendering();
    }

    /// 延迟的 resize：只在外层循环的帧间隙调用
    ///
    /// 完整的 device-idle 等待后按当前窗口大小重建 swapchain。
    /// offscreen 目标保持初始大小，draw extent 和缩放 blit 吸收差异
    pub fn resize_swapchain(&mut self, window: &winit::window::Window) {
        self.gfx.wait_idle();

        let size = window.inner_size();
        self.swapchain.rebuild(
            &self.gfx,
            vk::Extent2D {
                width: size.width,
                height: size.height,
            },
        );

        self.resize_requested = false;
        log::info!("swapchain resized to {}x{}", size.width, size.height);
    }
}

// getter
impl Renderer {
    #[inline]
    pub fn gfx(&self) -> &Gfx {
        &self.gfx
    }

    #[inline]
    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

// destroy
impl Renderer {
    pub fn destroy(mut self) {
        // 确保 GPU 完全空闲后才开始拆
        self.gfx.wait_idle();

        for (_, scene) in self.loaded_scenes.drain() {
            scene.destroy(&self.gfx);
        }
        for model in self.imported_models.drain(..) {
            model.destroy(&self.gfx);
        }

        if let Some(ui_pass) = self.ui_pass.take() {
            ui_pass.destroy(&self.gfx);
        }
        if let Some(post_process) = self.post_process.take() {
            unsafe {
                self.gfx.device().destroy_pipeline(post_process.pipeline, None);
                self.gfx.device().destroy_pipeline_layout(post_process.pipeline_layout, None);
                self.gfx.device().destroy_descriptor_set_layout(post_process.set_layout, None);
            }
        }

        for frame in self.frames.drain(..) {
            frame.destroy(&self.gfx);
        }

        self.default_material = None;
        self.metal_rough_material = None;

        self.rectangle.index_buffer.destroy(&self.gfx);
        self.rectangle.vertex_buffer.destroy(&self.gfx);
        self.default_material_constants.destroy(&self.gfx);
        self.white_image.destroy(&self.gfx);
        self.grey_image.destroy(&self.gfx);
        self.black_image.destroy(&self.gfx);
        self.error_checkerboard_image.destroy(&self.gfx);

        self.targets.draw_image.destroy(&self.gfx);
        self.targets.depth_image.destroy(&self.gfx);
        self.targets.post_process_image.destroy(&self.gfx);

        self.background.destroy(&self.gfx);

        // 剩余的 handle 类资源逆序统一销毁
        self.global_deletion_queue.flush(&self.gfx);

        self.material_descriptor_allocator.destroy_pools(&self.gfx);
        self.global_descriptor_allocator.destroy_pool(&self.gfx);

        self.swapchain.destroy(&self.gfx);
        self.gfx.destroy();
    }
}
