use ash::vk;
use vk_mem::Alloc;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 计算完整 mip chain 的层数：floor(log2(max(w, h))) + 1
#[inline]
pub fn full_mip_levels(extent: vk::Extent2D) -> u32 {
    u32::max(extent.width, extent.height).ilog2() + 1
}

/// 根据 format 推断 image aspect：深度格式使用 DEPTH，其余使用 COLOR
#[inline]
pub fn aspect_mask_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// 由 VMA 分配内存的 2D image，image view 一并创建
///
/// 和 GfxBuffer 相同的所有权纪律：恰好销毁一次，
/// 可能被 in-flight command 引用时必须走 deletion queue。
pub struct GfxImage {
    handle: vk::Image,
    allocation: vk_mem::Allocation,
    view: vk::ImageView,

    extent: vk::Extent3D,
    format: vk::Format,
    mip_levels: u32,

    name: String,
}

// init & destroy
impl GfxImage {
    pub fn new(
        gfx: &Gfx,
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        mipmapped: bool,
        debug_name: impl AsRef<str>,
    ) -> Self {
        let mip_levels = if mipmapped {
            full_mip_levels(vk::Extent2D {
                width: extent.width,
                height: extent.height,
            })
        } else {
            1
        };

        let image_ci = vk::ImageCreateInfo {
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent,
            mip_levels,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            // vulkan 要求初始 layout 只能是 UNDEFINED 或者 PREINITIALIZED
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };

        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            required_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            ..Default::default()
        };

        let (image, alloc) = unsafe { gfx.allocator().create_image(&image_ci, &alloc_ci).unwrap() };

        let view_ci = vk::ImageViewCreateInfo::default()
            .view_type(vk::ImageViewType::TYPE_2D)
            .image(image)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_mask_for_format(format),
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe { gfx.device().create_image_view(&view_ci, None).unwrap() };

        let image = Self {
            handle: image,
            allocation: alloc,
            view,
            extent,
            format,
            mip_levels,
            name: debug_name.as_ref().to_string(),
        };
        gfx.device().set_debug_name(&image, debug_name);
        image
    }

    pub fn destroy(mut self, gfx: &Gfx) {
        log::debug!("destroying GfxImage: {}", self.name);
        unsafe {
            gfx.device().destroy_image_view(self.view, None);
            gfx.allocator().destroy_image(self.handle, &mut self.allocation);
        }
    }
}

// getter
impl GfxImage {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        self.extent
    }

    #[inline]
    pub fn extent_2d(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.extent.width,
            height: self.extent.height,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mip_levels_for_pow2_image() {
        let levels = full_mip_levels(vk::Extent2D {
            width: 256,
            height: 256,
        });
        assert_eq!(levels, 9);
    }

    #[test]
    fn mip_levels_for_npot_image() {
        let levels = full_mip_levels(vk::Extent2D {
            width: 255,
            height: 255,
        });
        assert_eq!(levels, 8);
    }

    #[test]
    fn mip_levels_uses_longer_edge() {
        let levels = full_mip_levels(vk::Extent2D {
            width: 16,
            height: 512,
        });
        assert_eq!(levels, 10);

        let levels = full_mip_levels(vk::Extent2D { width: 1, height: 1 });
        assert_eq!(levels, 1);
    }

    #[test]
    fn aspect_follows_format() {
        assert_eq!(aspect_mask_for_format(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(aspect_mask_for_format(vk::Format::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
        assert_eq!(aspect_mask_for_format(vk::Format::R16G16B16A16_SFLOAT), vk::ImageAspectFlags::COLOR);
    }
}
