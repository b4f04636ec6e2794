use ash::vk;
use corvus_gfx::{
    commands::{command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, fence::GfxFence, semaphore::GfxSemaphore},
    descriptors::allocator::{DescriptorAllocatorGrowable, PoolSizeRatio},
    gfx::Gfx,
};

use crate::deletion_queue::DeletionQueue;

/// in-flight 的帧数：CPU 最多领先 GPU 一帧
pub const FRAME_OVERLAP: usize = 2;

/// 轮转复用的帧上下文
///
/// 启动时创建一次，此后每隔 FRAME_OVERLAP 帧复用一次。
/// 它的资源只有在 render fence signal 之后才允许复用；
/// deletion queue 和 descriptor pool 的回收都发生在那个时刻之后。
pub struct FrameSlot {
    pub command_pool: GfxCommandPool,
    pub main_command_buffer: GfxCommandBuffer,

    /// swapchain image 可用时 signal；submit 等待它
    pub swapchain_semaphore: GfxSemaphore,
    /// 渲染完成时 signal；present 等待它
    pub render_semaphore: GfxSemaphore,
    /// 渲染完成时 signal；CPU 在复用该 slot 前等待它
    pub render_fence: GfxFence,

    /// 本帧临时 descriptor 的来源，slot 复用时整体 reset
    pub frame_descriptors: DescriptorAllocatorGrowable,
    /// 本帧的瞬态资源，slot 复用时（fence 之后）flush
    pub deletion_queue: DeletionQueue,
}

// init & destroy
impl FrameSlot {
    pub fn new(gfx: &Gfx, index: usize) -> Self {
        let command_pool = GfxCommandPool::new(
            gfx.device().clone(),
            gfx.physical_device().gfx_queue_family().clone(),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            &format!("frame-{index}"),
        );
        let main_command_buffer =
            GfxCommandBuffer::new(gfx.device().clone(), &command_pool, &format!("frame-{index}-main"));

        let frame_ratios = vec![
            PoolSizeRatio {
                descriptor_type: vk::DescriptorType::STORAGE_IMAGE,
                ratio: 3.0,
            },
            PoolSizeRatio {
                descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
                ratio: 3.0,
            },
            PoolSizeRatio {
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                ratio: 3.0,
            },
            PoolSizeRatio {
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                ratio: 4.0,
            },
        ];

        Self {
            command_pool,
            main_command_buffer,
            // fence 初始为 signaled，第一帧的 WaitPrevious 不会卡死
            render_fence: GfxFence::new(gfx.device().clone(), true, &format!("frame-{index}-render")),
            swapchain_semaphore: GfxSemaphore::new(gfx.device().clone(), &format!("frame-{index}-swapchain")),
            render_semaphore: GfxSemaphore::new(gfx.device().clone(), &format!("frame-{index}-render")),
            frame_descriptors: DescriptorAllocatorGrowable::new(gfx, 1000, frame_ratios),
            deletion_queue: DeletionQueue::new(),
        }
    }

    pub fn destroy(mut self, gfx: &Gfx) {
        // 调用方必须保证 GPU 已经 idle
        self.deletion_queue.flush(gfx);
        self.frame_descriptors.destroy_pools(gfx);
        self.render_fence.destroy();
        self.swapchain_semaphore.destroy();
        self.render_semaphore.destroy();
        self.command_pool.destroy();
    }
}
