use std::path::Path;

use ash::vk;
use corvus_gfx::{
    commands::command_buffer::GfxCommandBuffer, gfx::Gfx, pipelines::compute_pipeline::ComputePipeline,
};

/// compute 背景效果的参数块，4 个 vec4 的含义由各效果自行解释
#[repr(C)]
#[derive(Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ComputePushConstants {
    pub data1: glam::Vec4,
    pub data2: glam::Vec4,
    pub data3: glam::Vec4,
    pub data4: glam::Vec4,
}

/// 一个可切换的程序化背景效果
pub struct ComputeEffect {
    pub name: &'static str,
    pub pipeline: ComputePipeline,
    /// UI 可以实时修改
    pub data: ComputePushConstants,
}

/// 背景 pass：全 draw-image 范围的 compute dispatch，16×16 workgroup
pub struct BackgroundEffects {
    pub effects: Vec<ComputeEffect>,
    pub current: usize,
}

// init & destroy
impl BackgroundEffects {
    pub fn new(gfx: &Gfx, draw_image_layout: vk::DescriptorSetLayout) -> Self {
        let mut effects = Vec::new();

        // shader 缺失时对应效果缺席，不影响引擎其余部分
        let mut add_effect = |name: &'static str, path: &str, data: ComputePushConstants| {
            match ComputePipeline::new(
                gfx,
                std::slice::from_ref(&draw_image_layout),
                std::mem::size_of::<ComputePushConstants>() as u32,
                Path::new(path),
                name,
            ) {
                Ok(pipeline) => effects.push(ComputeEffect {
                    name,
                    pipeline,
                    data,
                }),
                Err(e) => log::error!("failed to build background effect {name}: {e:#}"),
            }
        };

        add_effect(
            "gradient",
            "assets/shaders/gradient_color.comp.spv",
            ComputePushConstants {
                data1: glam::vec4(1.0, 0.0, 0.0, 1.0),
                data2: glam::vec4(0.0, 0.0, 1.0, 1.0),
                ..Default::default()
            },
        );
        add_effect(
            "sky",
            "assets/shaders/sky.comp.spv",
            ComputePushConstants {
                data1: glam::vec4(0.1, 0.2, 0.4, 0.97),
                ..Default::default()
            },
        );

        Self { effects, current: 0 }
    }

    pub fn destroy(self, gfx: &Gfx) {
        for effect in self.effects {
            effect.pipeline.destroy(gfx);
        }
    }
}

// tools
impl BackgroundEffects {
    /// 录制当前选中效果的 dispatch；没有任何可用效果时直接跳过
    pub fn record(&self, cmd: &GfxCommandBuffer, draw_image_set: vk::DescriptorSet, extent: vk::Extent2D) {
        let Some(effect) = self.effects.get(self.current) else {
            return;
        };

        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::COMPUTE, effect.pipeline.handle());
        cmd.cmd_bind_descriptor_sets(
            vk::PipelineBindPoint::COMPUTE,
            effect.pipeline.layout(),
            0,
            std::slice::from_ref(&draw_image_set),
        );
        cmd.cmd_push_constants(
            effect.pipeline.layout(),
            vk::ShaderStageFlags::COMPUTE,
            0,
            bytemuck::bytes_of(&effect.data),
        );

        // 16×16 的 workgroup，向上取整保证覆盖整个 extent
        cmd.cmd_dispatch(glam::uvec3(extent.width.div_ceil(16), extent.height.div_ceil(16), 1));
    }
}
