use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{command_queue::GfxCommandQueue, semaphore::GfxSemaphore},
    gfx::Gfx,
    swapchain::surface::GfxSurface,
};

/// swapchain 的 acquire/present 结果中需要上层响应的状态
///
/// OUT_OF_DATE 不是错误：上层应当设置 resize-pending 标记并干净地放弃当前帧
#[derive(Debug)]
pub struct SwapchainOutOfDate;

pub struct RenderSwapchain {
    surface: GfxSurface,
    swapchain_pf: ash::khr::swapchain::Device,
    swapchain_handle: vk::SwapchainKHR,

    /// 这里的 image 并非手动创建的，因此无法使用 GfxImage 类型
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,

    color_format: vk::Format,
    extent: vk::Extent2D,
}

// init & destroy
impl RenderSwapchain {
    const SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    pub fn new(gfx: &Gfx, window: &winit::window::Window) -> Self {
        let surface = GfxSurface::new(gfx, window);
        let swapchain_pf = ash::khr::swapchain::Device::new(gfx.instance().ash_instance(), gfx.device());

        let size = window.inner_size();
        let mut swapchain = Self {
            surface,
            swapchain_pf,
            swapchain_handle: vk::SwapchainKHR::null(),
            images: vec![],
            image_views: vec![],
            color_format: Self::SURFACE_FORMAT.format,
            extent: vk::Extent2D {
                width: size.width,
                height: size.height,
            },
        };
        swapchain.create_swapchain(gfx, swapchain.extent);
        swapchain
    }

    fn create_swapchain(&mut self, gfx: &Gfx, extent: vk::Extent2D) {
        let capabilities = self.surface.capabilities(gfx);

        // 确定 image count
        // max_image_count == 0 表示不限制 image 数量
        let image_count = if capabilities.max_image_count == 0 {
            capabilities.min_image_count + 1
        } else {
            u32::min(capabilities.max_image_count, capabilities.min_image_count + 1)
        };

        let extent = vk::Extent2D {
            width: extent.width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
            height: extent
                .height
                .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface.handle)
            .min_image_count(image_count)
            .image_format(Self::SURFACE_FORMAT.format)
            .image_color_space(Self::SURFACE_FORMAT.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            // TRANSFER_DST：offscreen 渲染结果通过 blit 进入 swapchain image
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            // vsync
            .present_mode(vk::PresentModeKHR::FIFO)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true);

        let swapchain_handle = unsafe { self.swapchain_pf.create_swapchain(&create_info, None).unwrap() };
        gfx.device().set_object_debug_name(swapchain_handle, "main-swapchain");

        let images = unsafe { self.swapchain_pf.get_swapchain_images(swapchain_handle).unwrap() };
        for (img_idx, img) in images.iter().enumerate() {
            gfx.device().set_object_debug_name(*img, format!("swapchain-image-{img_idx}"));
        }

        let image_views = images
            .iter()
            .map(|img| {
                let view_ci = vk::ImageViewCreateInfo::default()
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .image(*img)
                    .format(Self::SURFACE_FORMAT.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                unsafe { gfx.device().create_image_view(&view_ci, None).unwrap() }
            })
            .collect_vec();

        self.swapchain_handle = swapchain_handle;
        self.images = images;
        self.image_views = image_views;
        self.extent = extent;
    }

    fn destroy_swapchain(&mut self, gfx: &Gfx) {
        unsafe {
            self.swapchain_pf.destroy_swapchain(self.swapchain_handle, None);
            for view in self.image_views.drain(..) {
                gfx.device().destroy_image_view(view, None);
            }
        }
        self.images.clear();
    }

    /// 按新的窗口大小重建 swapchain
    ///
    /// 调用方必须先保证 device idle
    pub fn rebuild(&mut self, gfx: &Gfx, new_extent: vk::Extent2D) {
        self.destroy_swapchain(gfx);
        self.create_swapchain(gfx, new_extent);
    }

    pub fn destroy(mut self, gfx: &Gfx) {
        self.destroy_swapchain(gfx);
        self.surface.destroy();
    }
}

// getter
impl RenderSwapchain {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    #[inline]
    pub fn image(&self, index: u32) -> vk::Image {
        self.images[index as usize]
    }

    #[inline]
    pub fn image_view(&self, index: u32) -> vk::ImageView {
        self.image_views[index as usize]
    }
}

// tools
impl RenderSwapchain {
    /// 请求下一张 swapchain image
    ///
    /// - timeout 单位是纳秒
    /// - OUT_OF_DATE 通过 Err 返回，上层据此放弃当前帧；其余错误 fatal
    pub fn acquire_next_image(
        &self,
        semaphore: &GfxSemaphore,
        timeout: u64,
    ) -> Result<u32, SwapchainOutOfDate> {
        let result = unsafe {
            self.swapchain_pf.acquire_next_image(
                self.swapchain_handle,
                timeout,
                semaphore.handle(),
                vk::Fence::null(),
            )
        };

        match result {
            // suboptimal 时仍然渲染这一帧
            Ok((image_index, _suboptimal)) => Ok(image_index),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(SwapchainOutOfDate),
            Err(e) => panic!("failed to acquire swapchain image: {:?}", e),
        }
    }

    /// present 一张 image，等待 render-complete semaphore
    ///
    /// OUT_OF_DATE 通过 Err 返回；当前帧已经算是完成，不会重试
    pub fn present_image(
        &self,
        queue: &GfxCommandQueue,
        wait_semaphore: &GfxSemaphore,
        image_index: u32,
    ) -> Result<(), SwapchainOutOfDate> {
        let wait_semaphores = [wait_semaphore.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.swapchain_handle));

        let result = unsafe { self.swapchain_pf.queue_present(queue.handle(), &present_info) };
        match result {
            Ok(_suboptimal) => Ok(()),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(SwapchainOutOfDate),
            Err(e) => panic!("failed to present swapchain image: {:?}", e),
        }
    }
}
