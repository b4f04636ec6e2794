use ash::vk;

use crate::gfx::Gfx;

/// descriptor set layout 的构建器
///
/// 累积 (binding index, descriptor type)；`build` 产生 immutable 的 layout，
/// 所有 binding 共享同一份 shader stage 可见性（本设计不支持 per-binding stage）
#[derive(Default)]
pub struct DescriptorLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'static>>,
}

impl DescriptorLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binding(&mut self, binding: u32, descriptor_type: vk::DescriptorType) -> &mut Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(1),
        );
        self
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn build(&self, gfx: &Gfx, stages: vk::ShaderStageFlags) -> vk::DescriptorSetLayout {
        let bindings =
            self.bindings.iter().map(|b| b.stage_flags(stages)).collect::<Vec<_>>();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        unsafe { gfx.device().create_descriptor_set_layout(&create_info, None).unwrap() }
    }
}
