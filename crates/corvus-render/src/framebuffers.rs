use ash::vk;
use corvus_gfx::{gfx::Gfx, resources::image::GfxImage};

/// offscreen 的渲染目标：geometry 画进 draw image，
/// post-process 把 draw image 变换进 post-process image，
/// 最终 blit 进 swapchain image
///
/// 三张 image 都按初始窗口大小创建一次；窗口 resize 只重建 swapchain，
/// draw extent 和缩放 blit 负责吸收尺寸差
pub struct FrameTargets {
    pub draw_image: GfxImage,
    pub depth_image: GfxImage,
    pub post_process_image: GfxImage,
}

impl FrameTargets {
    pub const COLOR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
    pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

    pub fn new(gfx: &Gfx, window_extent: vk::Extent2D) -> Self {
        let extent = vk::Extent3D {
            width: window_extent.width,
            height: window_extent.height,
            depth: 1,
        };

        let draw_image_usage = vk::ImageUsageFlags::TRANSFER_SRC
            | vk::ImageUsageFlags::STORAGE
            | vk::ImageUsageFlags::COLOR_ATTACHMENT;

        let draw_image = GfxImage::new(gfx, extent, Self::COLOR_FORMAT, draw_image_usage, false, "draw-image");
        let depth_image = GfxImage::new(
            gfx,
            extent,
            Self::DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            false,
            "depth-image",
        );
        let post_process_image =
            GfxImage::new(gfx, extent, Self::COLOR_FORMAT, draw_image_usage, false, "post-process-image");

        Self {
            draw_image,
            depth_image,
            post_process_image,
        }
    }
}
