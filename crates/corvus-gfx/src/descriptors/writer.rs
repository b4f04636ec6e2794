use ash::vk;

use crate::gfx::Gfx;

/// descriptor set 的写入器
///
/// 累积 buffer/image 的绑定信息，`update_set` 一次性应用所有写入并清空。
/// 两次 update 之间不要对同一个 binding 重复写入。
#[derive(Default)]
pub struct DescriptorWriter {
    buffer_writes: Vec<(u32, vk::DescriptorType, vk::DescriptorBufferInfo)>,
    image_writes: Vec<(u32, vk::DescriptorType, vk::DescriptorImageInfo)>,
}

impl DescriptorWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_buffer(
        &mut self,
        binding: u32,
        buffer: vk::Buffer,
        size: vk::DeviceSize,
        offset: vk::DeviceSize,
        descriptor_type: vk::DescriptorType,
    ) -> &mut Self {
        self.buffer_writes.push((
            binding,
            descriptor_type,
            vk::DescriptorBufferInfo {
                buffer,
                offset,
                range: size,
            },
        ));
        self
    }

    pub fn write_image(
        &mut self,
        binding: u32,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
        descriptor_type: vk::DescriptorType,
    ) -> &mut Self {
        self.image_writes.push((
            binding,
            descriptor_type,
            vk::DescriptorImageInfo {
                sampler,
                image_view,
                image_layout: layout,
            },
        ));
        self
    }

    pub fn clear(&mut self) {
        self.buffer_writes.clear();
        self.image_writes.clear();
    }

    /// 将累积的写入一次性应用到 set 上，然后清空累积的内容
    pub fn update_set(&mut self, gfx: &Gfx, set: vk::DescriptorSet) {
        let mut writes = Vec::with_capacity(self.buffer_writes.len() + self.image_writes.len());

        for (binding, descriptor_type, buffer_info) in &self.buffer_writes {
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_binding(*binding)
                    .dst_set(set)
                    .descriptor_type(*descriptor_type)
                    .buffer_info(std::slice::from_ref(buffer_info)),
            );
        }
        for (binding, descriptor_type, image_info) in &self.image_writes {
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_binding(*binding)
                    .dst_set(set)
                    .descriptor_type(*descriptor_type)
                    .image_info(std::slice::from_ref(image_info)),
            );
        }

        unsafe {
            gfx.device().update_descriptor_sets(&writes, &[]);
        }

        drop(writes);
        self.clear();
    }
}
