use ash::vk;

use crate::gfx::Gfx;

/// graphics pipeline 的构建器
///
/// 约定：
/// - viewport/scissor 的数量固定为 1，具体值是 dynamic state，每次绘制时设置，
///   窗口 resize 不需要重建 pipeline
/// - vertex input 永远为空：所有顶点数据都通过 push constant 中的
///   buffer device address 在 shader 内读取，不使用固定管线的顶点属性
/// - attachment format 用于 dynamic rendering，不存在 render pass 对象
pub struct PipelineBuilder {
    shader_stages: Vec<vk::PipelineShaderStageCreateInfo<'static>>,

    input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'static>,
    rasterizer: vk::PipelineRasterizationStateCreateInfo<'static>,
    color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    multisampling: vk::PipelineMultisampleStateCreateInfo<'static>,
    depth_stencil: vk::PipelineDepthStencilStateCreateInfo<'static>,

    pipeline_layout: vk::PipelineLayout,

    color_attachment_format: vk::Format,
    depth_attachment_format: vk::Format,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            shader_stages: vec![],
            input_assembly: vk::PipelineInputAssemblyStateCreateInfo::default(),
            rasterizer: vk::PipelineRasterizationStateCreateInfo::default(),
            color_blend_attachment: vk::PipelineColorBlendAttachmentState::default(),
            multisampling: vk::PipelineMultisampleStateCreateInfo::default(),
            depth_stencil: vk::PipelineDepthStencilStateCreateInfo::default(),
            pipeline_layout: vk::PipelineLayout::null(),
            color_attachment_format: vk::Format::UNDEFINED,
            depth_attachment_format: vk::Format::UNDEFINED,
        }
    }
}

// builder
impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// 固定是 vertex + fragment 两个 stage，entry point 都是 main
    pub fn set_shaders(&mut self, vertex_shader: vk::ShaderModule, fragment_shader: vk::ShaderModule) -> &mut Self {
        self.shader_stages.clear();
        self.shader_stages.push(
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_shader)
                .name(c"main"),
        );
        self.shader_stages.push(
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_shader)
                .name(c"main"),
        );
        self
    }

    pub fn set_input_topology(&mut self, topology: vk::PrimitiveTopology) -> &mut Self {
        self.input_assembly.topology = topology;
        self.input_assembly.primitive_restart_enable = vk::FALSE;
        self
    }

    pub fn set_polygon_mode(&mut self, mode: vk::PolygonMode) -> &mut Self {
        self.rasterizer.polygon_mode = mode;
        self.rasterizer.line_width = 1.0;
        self
    }

    pub fn set_cull_mode(&mut self, cull_mode: vk::CullModeFlags, front_face: vk::FrontFace) -> &mut Self {
        self.rasterizer.cull_mode = cull_mode;
        self.rasterizer.front_face = front_face;
        self
    }

    /// 固定 1 sample，不开 alpha-to-coverage
    pub fn set_multisampling_none(&mut self) -> &mut Self {
        self.multisampling.sample_shading_enable = vk::FALSE;
        self.multisampling.rasterization_samples = vk::SampleCountFlags::TYPE_1;
        self.multisampling.min_sample_shading = 1.0;
        self.multisampling.alpha_to_coverage_enable = vk::FALSE;
        self.multisampling.alpha_to_one_enable = vk::FALSE;
        self
    }

    pub fn disable_blending(&mut self) -> &mut Self {
        self.color_blend_attachment.color_write_mask = vk::ColorComponentFlags::RGBA;
        self.color_blend_attachment.blend_enable = vk::FALSE;
        self
    }

    /// additive: color = srcAlpha·src + 1·dst
    pub fn enable_blending_additive(&mut self) -> &mut Self {
        self.color_blend_attachment.color_write_mask = vk::ColorComponentFlags::RGBA;
        self.color_blend_attachment.blend_enable = vk::TRUE;
        self.color_blend_attachment.src_color_blend_factor = vk::BlendFactor::SRC_ALPHA;
        self.color_blend_attachment.dst_color_blend_factor = vk::BlendFactor::ONE;
        self.color_blend_attachment.color_blend_op = vk::BlendOp::ADD;
        self.color_blend_attachment.src_alpha_blend_factor = vk::BlendFactor::ONE;
        self.color_blend_attachment.dst_alpha_blend_factor = vk::BlendFactor::ZERO;
        self.color_blend_attachment.alpha_blend_op = vk::BlendOp::ADD;
        self
    }

    /// alpha blend: color = srcAlpha·src + (1−srcAlpha)·dst
    pub fn enable_blending_alphablend(&mut self) -> &mut Self {
        self.color_blend_attachment.color_write_mask = vk::ColorComponentFlags::RGBA;
        self.color_blend_attachment.blend_enable = vk::TRUE;
        self.color_blend_attachment.src_color_blend_factor = vk::BlendFactor::SRC_ALPHA;
        self.color_blend_attachment.dst_color_blend_factor = vk::BlendFactor::ONE_MINUS_SRC_ALPHA;
        self.color_blend_attachment.color_blend_op = vk::BlendOp::ADD;
        self.color_blend_attachment.src_alpha_blend_factor = vk::BlendFactor::ONE;
        self.color_blend_attachment.dst_alpha_blend_factor = vk::BlendFactor::ZERO;
        self.color_blend_attachment.alpha_blend_op = vk::BlendOp::ADD;
        self
    }

    pub fn set_color_attachment_format(&mut self, format: vk::Format) -> &mut Self {
        self.color_attachment_format = format;
        self
    }

    pub fn set_depth_format(&mut self, format: vk::Format) -> &mut Self {
        self.depth_attachment_format = format;
        self
    }

    pub fn disable_depthtest(&mut self) -> &mut Self {
        self.depth_stencil.depth_test_enable = vk::FALSE;
        self.depth_stencil.depth_write_enable = vk::FALSE;
        self.depth_stencil.depth_compare_op = vk::CompareOp::NEVER;
        self.depth_stencil.depth_bounds_test_enable = vk::FALSE;
        self.depth_stencil.stencil_test_enable = vk::FALSE;
        self.depth_stencil.min_depth_bounds = 0.0;
        self.depth_stencil.max_depth_bounds = 1.0;
        self
    }

    /// bounds test 和 stencil test 始终关闭，depth bounds 固定 [0, 1]
    pub fn enable_depthtest(&mut self, depth_write_enable: bool, op: vk::CompareOp) -> &mut Self {
        self.depth_stencil.depth_test_enable = vk::TRUE;
        self.depth_stencil.depth_write_enable = if depth_write_enable { vk::TRUE } else { vk::FALSE };
        self.depth_stencil.depth_compare_op = op;
        self.depth_stencil.depth_bounds_test_enable = vk::FALSE;
        self.depth_stencil.stencil_test_enable = vk::FALSE;
        self.depth_stencil.min_depth_bounds = 0.0;
        self.depth_stencil.max_depth_bounds = 1.0;
        self
    }

    pub fn set_pipeline_layout(&mut self, layout: vk::PipelineLayout) -> &mut Self {
        self.pipeline_layout = layout;
        self
    }
}

// build
impl PipelineBuilder {
    /// 组装 pipeline
    ///
    /// pipeline 对象的创建失败是可恢复的：记录日志并返回 None，
    /// 调用方可以跳过这条 pipeline（layout 等其余对象的失败仍然是 fatal）
    pub fn build(&self, gfx: &Gfx) -> Option<vk::Pipeline> {
        // viewport/scissor 只声明数量，具体值由 dynamic state 提供
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(std::slice::from_ref(&self.color_blend_attachment));

        // 顶点数据全部走 buffer device address，这里完全为空
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_info = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let mut render_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(std::slice::from_ref(&self.color_attachment_format))
            .depth_attachment_format(self.depth_attachment_format);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&self.shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&self.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&self.rasterizer)
            .multisample_state(&self.multisampling)
            .color_blend_state(&color_blending)
            .depth_stencil_state(&self.depth_stencil)
            .layout(self.pipeline_layout)
            .dynamic_state(&dynamic_info)
            .push_next(&mut render_info);

        let result = unsafe {
            gfx.device().create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
        };

        match result {
            Ok(pipelines) => Some(pipelines[0]),
            Err((_, e)) => {
                log::error!("failed to create graphics pipeline: {:?}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disable_blending_turns_blend_off() {
        let mut builder = PipelineBuilder::new();
        builder.disable_blending();

        assert_eq!(builder.color_blend_attachment.blend_enable, vk::FALSE);
        assert_eq!(builder.color_blend_attachment.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn additive_blend_factors() {
        let mut builder = PipelineBuilder::new();
        builder.enable_blending_additive();

        let state = &builder.color_blend_attachment;
        assert_eq!(state.blend_enable, vk::TRUE);
        assert_eq!(state.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(state.dst_color_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(state.color_blend_op, vk::BlendOp::ADD);
        assert_eq!(state.src_alpha_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(state.dst_alpha_blend_factor, vk::BlendFactor::ZERO);
        assert_eq!(state.alpha_blend_op, vk::BlendOp::ADD);
    }

    #[test]
    fn alphablend_blend_factors() {
        let mut builder = PipelineBuilder::new();
        builder.enable_blending_alphablend();

        let state = &builder.color_blend_attachment;
        assert_eq!(state.blend_enable, vk::TRUE);
        assert_eq!(state.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(state.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
        assert_eq!(state.color_blend_op, vk::BlendOp::ADD);
        assert_eq!(state.src_alpha_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(state.dst_alpha_blend_factor, vk::BlendFactor::ZERO);
        assert_eq!(state.alpha_blend_op, vk::BlendOp::ADD);
    }

    #[test]
    fn depth_state_presets() {
        let mut builder = PipelineBuilder::new();
        builder.enable_depthtest(true, vk::CompareOp::GREATER_OR_EQUAL);
        assert_eq!(builder.depth_stencil.depth_test_enable, vk::TRUE);
        assert_eq!(builder.depth_stencil.depth_write_enable, vk::TRUE);
        assert_eq!(builder.depth_stencil.depth_compare_op, vk::CompareOp::GREATER_OR_EQUAL);
        assert_eq!(builder.depth_stencil.depth_bounds_test_enable, vk::FALSE);
        assert_eq!(builder.depth_stencil.stencil_test_enable, vk::FALSE);
        assert_eq!(builder.depth_stencil.min_depth_bounds, 0.0);
        assert_eq!(builder.depth_stencil.max_depth_bounds, 1.0);

        builder.disable_depthtest();
        assert_eq!(builder.depth_stencil.depth_test_enable, vk::FALSE);
        assert_eq!(builder.depth_stencil.depth_write_enable, vk::FALSE);
    }
}
