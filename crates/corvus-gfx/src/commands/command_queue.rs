use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{fence::GfxFence, submit_info::GfxSubmitInfo},
    foundation::{device::GfxDevice, physical_device::GfxQueueFamily},
};

pub struct GfxCommandQueue {
    pub(crate) vk_queue: vk::Queue,
    pub(crate) queue_family: GfxQueueFamily,
    pub(crate) device: Rc<GfxDevice>,
}

// getter
impl GfxCommandQueue {
    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }

    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }
}

// tools
impl GfxCommandQueue {
    pub fn submit(&self, submit_infos: Vec<GfxSubmitInfo>, fence: Option<&GfxFence>) {
        let submit_infos = submit_infos.iter().map(GfxSubmitInfo::submit_info).collect_vec();
        unsafe {
            self.device
                .queue_submit2(self.vk_queue, &submit_infos, fence.map_or(vk::Fence::null(), |f| f.handle()))
                .unwrap();
        }
    }

    pub fn wait_idle(&self) {
        unsafe {
            self.device.queue_wait_idle(self.vk_queue).unwrap();
        }
    }
}
