use std::path::Path;

use ash::vk;
use corvus_gfx::{
    commands::command_buffer::GfxCommandBuffer,
    descriptors::{
        allocator::DescriptorAllocator, layout_builder::DescriptorLayoutBuilder, writer::DescriptorWriter,
    },
    gfx::Gfx,
    pipelines::{graphics_pipeline::PipelineBuilder, shader::ShaderModule},
    resources::{buffer::GfxBuffer, image::GfxImage},
};

use crate::{
    deletion_queue::{DeferredDestroy, DeletionQueue},
    upload::upload_image,
};

/// UI pass 的 push constant：NDC 变换 + 顶点数据的 device address
///
/// imgui 的顶点和场景几何一样走 buffer device address，
/// 共用 PipelineBuilder 的 "vertex input 恒为空" 约定
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct UiPushConstants {
    scale: [f32; 2],
    translate: [f32; 2],
    vertex_buffer: vk::DeviceAddress,
}

/// imgui overlay：直接画进 swapchain image 的最后一个 pass
pub struct UiPass {
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,

    font_layout: vk::DescriptorSetLayout,
    font_set: vk::DescriptorSet,
    font_image: GfxImage,
    font_sampler: vk::Sampler,
}

// init & destroy
impl UiPass {
    pub fn new(
        gfx: &Gfx,
        imgui_ctx: &mut imgui::Context,
        swapchain_format: vk::Format,
        global_descriptor_allocator: &mut DescriptorAllocator,
    ) -> anyhow::Result<Self> {
        let vertex_shader = ShaderModule::load(gfx, Path::new("assets/shaders/ui.vert.spv"))?;
        let fragment_shader = match ShaderModule::load(gfx, Path::new("assets/shaders/ui.frag.spv")) {
            Ok(m) => m,
            Err(e) => {
                vertex_shader.destroy(gfx);
                return Err(e);
            }
        };

        // 字体 atlas 上传为普通纹理
        let font_image = {
            let fonts = imgui_ctx.fonts();
            let atlas = fonts.build_rgba32_texture();
            let image = upload_image(
                gfx,
                atlas.data,
                vk::Extent3D {
                    width: atlas.width,
                    height: atlas.height,
                    depth: 1,
                },
                vk::Format::R8G8B8A8_UNORM,
                vk::ImageUsageFlags::SAMPLED,
                false,
                "imgui-fonts",
            );
            fonts.tex_id = imgui::TextureId::from(0usize);
            image
        };

        let sampler_ci = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR);
        let font_sampler = unsafe { gfx.device().create_sampler(&sampler_ci, None).unwrap() };

        let font_layout = DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .build(gfx, vk::ShaderStageFlags::FRAGMENT);

        let font_set = global_descriptor_allocator.allocate(gfx, font_layout);
        DescriptorWriter::new()
            .write_image(
                0,
                font_image.view(),
                font_sampler,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            )
            .update_set(gfx, font_set);

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .offset(0)
            .size(std::mem::size_of::<UiPushConstants>() as u32);
        let layout_ci = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(std::slice::from_ref(&font_layout))
            .push_constant_ranges(std::slice::from_ref(&push_constant_range));
        let pipeline_layout = unsafe { gfx.device().create_pipeline_layout(&layout_ci, None).unwrap() };

        let pipeline = PipelineBuilder::new()
            .set_shaders(vertex_shader.handle(), fragment_shader.handle())
            .set_input_topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .set_polygon_mode(vk::PolygonMode::FILL)
            .set_cull_mode(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE)
            .set_multisampling_none()
            .enable_blending_alphablend()
            .disable_depthtest()
            .set_color_attachment_format(swapchain_format)
            .set_pipeline_layout(pipeline_layout)
            .build(gfx);

        vertex_shader.destroy(gfx);
        fragment_shader.destroy(gfx);

        let Some(pipeline) = pipeline else {
            unsafe {
                gfx.device().destroy_pipeline_layout(pipeline_layout, None);
                gfx.device().destroy_descriptor_set_layout(font_layout, None);
                gfx.device().destroy_sampler(font_sampler, None);
            }
            font_image.destroy(gfx);
            anyhow::bail!("failed to build ui pipeline");
        };

        Ok(Self {
            pipeline,
            pipeline_layout,
            font_layout,
            font_set,
            font_image,
            font_sampler,
        })
    }

    pub fn destroy(self, gfx: &Gfx) {
        unsafe {
            gfx.device().destroy_pipeline(self.pipeline, None);
            gfx.device().destroy_pipeline_layout(self.pipeline_layout, None);
            gfx.device().destroy_descriptor_set_layout(self.font_layout, None);
            gfx.device().destroy_sampler(self.font_sampler, None);
        }
        self.font_image.destroy(gfx);
    }
}

// tools
impl UiPass {
    /// 把 imgui 的 draw data 画进 target（swapchain image view）
    ///
    /// 顶点/索引 buffer 每帧新建，注册进当前 frame slot 的 deletion queue，
    /// slot 的 fence signal 之后才会被释放
    pub fn draw(
        &self,
        gfx: &Gfx,
        cmd: &GfxCommandBuffer,
        frame_deletion_queue: &mut DeletionQueue,
        draw_data: &imgui::DrawData,
        target_view: vk::ImageView,
        target_extent: vk::Extent2D,
    ) {
        if draw_data.total_vtx_count == 0 {
            return;
        }

        // 所有 draw list 拼接进一对 buffer
        let vertex_buffer_size =
            draw_data.total_vtx_count as vk::DeviceSize * std::mem::size_of::<imgui::DrawVert>() as vk::DeviceSize;
        let index_buffer_size =
            draw_data.total_idx_count as vk::DeviceSize * std::mem::size_of::<imgui::DrawIdx>() as vk::DeviceSize;

        let vertex_buffer = GfxBuffer::new(
            gfx,
            vertex_buffer_size,
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            true,
            "imgui-vertices",
        );
        let index_buffer =
            GfxBuffer::new(gfx, index_buffer_size, vk::BufferUsageFlags::INDEX_BUFFER, true, "imgui-indices");

        let mut vertex_offset_bytes = 0;
        let mut index_offset_bytes = 0;
        for draw_list in draw_data.draw_lists() {
            vertex_buffer.transfer_data_by_mmap_offset(gfx, draw_list.vtx_buffer(), vertex_offset_bytes);
            index_buffer.transfer_data_by_mmap_offset(gfx, draw_list.idx_buffer(), index_offset_bytes);
            vertex_offset_bytes +=
                (draw_list.vtx_buffer().len() * std::mem::size_of::<imgui::DrawVert>()) as vk::DeviceSize;
            index_offset_bytes +=
                (draw_list.idx_buffer().len() * std::mem::size_of::<imgui::DrawIdx>()) as vk::DeviceSize;
        }

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(target_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE);
        let render_info = vk::RenderingInfo::default()
            .render_area(target_extent.into())
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment));

        cmd.cmd_begin_rendering(&render_info);
        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline);
        cmd.cmd_bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline_layout,
            0,
            std::slice::from_ref(&self.font_set),
        );
        cmd.cmd_bind_index_buffer(index_buffer.vk_buffer(), 0, vk::IndexType::UINT16);

        cmd.cmd_set_viewport(
            0,
            &[vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: target_extent.width as f32,
                height: target_extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );

        // 屏幕坐标 → NDC
        let display_size = draw_data.display_size;
        let display_pos = draw_data.display_pos;
        let scale = [2.0 / display_size[0], 2.0 / display_size[1]];
        let push_constants = UiPushConstants {
            scale,
            translate: [-1.0 - display_pos[0] * scale[0], -1.0 - display_pos[1] * scale[1]],
            vertex_buffer: vertex_buffer.device_address(),
        };
        cmd.cmd_push_constants(
            self.pipeline_layout,
            vk::ShaderStageFlags::VERTEX,
            0,
            bytemuck::bytes_of(&push_constants),
        );

        let clip_offset = display_pos;
        let clip_scale = draw_data.framebuffer_scale;
        let mut global_vtx_offset = 0i32;
        let mut global_idx_offset = 0u32;

        for draw_list in draw_data.draw_lists() {
            for command in draw_list.commands() {
                match command {
                    imgui::DrawCmd::Elements {
                        count,
                        cmd_params:
                            imgui::DrawCmdParams {
                                clip_rect,
                                vtx_offset,
                                idx_offset,
                                ..
                            },
                    } => {
                        let clip_x = (clip_rect[0] - clip_offset[0]) * clip_scale[0];
                        let clip_y = (clip_rect[1] - clip_offset[1]) * clip_scale[1];
                        let clip_w = (clip_rect[2] - clip_offset[0]) * clip_scale[0] - clip_x;
                        let clip_h = (clip_rect[3] - clip_offset[1]) * clip_scale[1] - clip_y;

                        cmd.cmd_set_scissor(
                            0,
                            &[vk::Rect2D {
                                offset: vk::Offset2D {
                                    x: (clip_x as i32).max(0),
                                    y: (clip_y as i32).max(0),
                                },
                                extent: vk::Extent2D {
                                    width: clip_w.max(0.0) as u32,
                                    height: clip_h.max(0.0) as u32,
                                },
                            }],
                        );

                        cmd.cmd_draw_indexed(
                            count as u32,
                            1,
                            global_idx_offset + idx_offset as u32,
                            global_vtx_offset + vtx_offset as i32,
                            0,
                        );
                    }
                    imgui::DrawCmd::ResetRenderState => {
                        log::warn!("imgui reset render state is not supported");
                    }
                    imgui::DrawCmd::RawCallback { .. } => {
                        log::warn!("imgui raw callback is not supported");
                    }
                }
            }

            global_idx_offset += draw_list.idx_buffer().len() as u32;
            global_vtx_offset += draw_list.vtx_buffer().len() as i32;
        }

        cmd.cmd_end_rendering();

        // GPU 还要读这两个 buffer，交给 frame slot 的 deletion queue 延迟释放
        frame_deletion_queue.push(DeferredDestroy::Buffer(vertex_buffer));
        frame_deletion_queue.push(DeferredDestroy::Buffer(index_buffer));
    }
}
