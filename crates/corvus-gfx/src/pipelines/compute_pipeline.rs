use std::path::Path;

use anyhow::Context;
use ash::vk;

use crate::{gfx::Gfx, pipelines::shader::ShaderModule};

/// compute pipeline：一个 shader stage + layout
///
/// layout 由外部传入的 descriptor set layouts 和 push constant 大小决定。
/// shader 加载失败和 pipeline 对象创建失败都是可恢复的。
pub struct ComputePipeline {
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
}

// init & destroy
impl ComputePipeline {
    pub fn new(
        gfx: &Gfx,
        descriptor_layouts: &[vk::DescriptorSetLayout],
        push_constant_size: u32,
        shader_path: &Path,
        debug_name: &str,
    ) -> anyhow::Result<Self> {
        let shader_module = ShaderModule::load(gfx, shader_path)?;

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::COMPUTE)
            .offset(0)
            .size(push_constant_size);

        let pipeline_layout_ci = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_layouts)
            .push_constant_ranges(std::slice::from_ref(&push_constant_range));
        let pipeline_layout = unsafe { gfx.device().create_pipeline_layout(&pipeline_layout_ci, None).unwrap() };

        let stage_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader_module.handle())
            .name(c"main");

        let pipeline_ci = vk::ComputePipelineCreateInfo::default().stage(stage_info).layout(pipeline_layout);
        let result = unsafe {
            gfx.device().create_compute_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_ci),
                None,
            )
        };

        shader_module.destroy(gfx);

        let pipeline = match result {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe { gfx.device().destroy_pipeline_layout(pipeline_layout, None) };
                return Err(e).with_context(|| format!("failed to create compute pipeline {}", debug_name));
            }
        };

        gfx.device().set_object_debug_name(pipeline, debug_name);

        Ok(Self {
            pipeline,
            pipeline_layout,
        })
    }

    pub fn destroy(self, gfx: &Gfx) {
        unsafe {
            gfx.device().destroy_pipeline(self.pipeline, None);
            gfx.device().destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}

// getter
impl ComputePipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }
}
