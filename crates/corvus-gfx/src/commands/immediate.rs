use std::rc::Rc;

use ash::vk;

use crate::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, command_queue::GfxCommandQueue,
        fence::GfxFence, submit_info::GfxSubmitInfo,
    },
    foundation::{device::GfxDevice, physical_device::GfxQueueFamily},
};

/// 立即提交的上下文：专用的 command pool/buffer + fence
///
/// 用于 mesh/texture 上传这类一次性的 GPU 工作。提交后阻塞当前线程
/// 直到 fence signal，所有上传操作彼此之间以及和渲染之间都是串行的。
/// 上传发生在加载期（不在稳态帧循环内），同步是刻意的设计。
pub struct ImmediateContext {
    pool: GfxCommandPool,
    command_buffer: GfxCommandBuffer,
    fence: GfxFence,

    device: Rc<GfxDevice>,
}

// init & destroy
impl ImmediateContext {
    pub fn new(device: Rc<GfxDevice>, queue_family: GfxQueueFamily) -> Self {
        let pool = GfxCommandPool::new(
            device.clone(),
            queue_family,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            "immediate",
        );
        let command_buffer = GfxCommandBuffer::new(device.clone(), &pool, "immediate");
        let fence = GfxFence::new(device.clone(), true, "immediate");

        Self {
            pool,
            command_buffer,
            fence,
            device,
        }
    }

    pub fn destroy(self) {
        self.fence.destroy();
        self.pool.destroy();
        let _ = self.device;
    }
}

// tools
impl ImmediateContext {
    /// 立即执行某个 command，并同步等待执行结果
    ///
    /// scope 内只负责录制：begin/end/submit/fence-wait 都由这里完成，
    /// 无论录制内容如何，command buffer 和 fence 都能保证被正确回收
    pub fn submit<F, R>(&self, queue: &GfxCommandQueue, func: F) -> R
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        self.fence.reset();
        self.command_buffer.reset();

        self.command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        let result = func(&self.command_buffer);
        self.command_buffer.end();

        queue.submit(vec![GfxSubmitInfo::new(std::slice::from_ref(&self.command_buffer))], Some(&self.fence));

        // 阻塞直到 GPU 完成，timeout 实际上是无限的
        self.fence.wait();

        result
    }
}
