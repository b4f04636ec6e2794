use std::{
    ffi::CStr,
    rc::Rc,
    sync::atomic::{AtomicBool, Ordering},
};

use ash::vk;

use crate::{
    commands::{command_buffer::GfxCommandBuffer, command_queue::GfxCommandQueue, immediate::ImmediateContext},
    foundation::{
        debug_messenger::DebugMsger, device::GfxDevice, instance::GfxInstance, physical_device::GfxPhysicalDevice,
        vmem_allocator::VMemAllocator,
    },
};

/// 进程内只允许存在一个 Gfx 实例
static GFX_ALIVE: AtomicBool = AtomicBool::new(false);

/// Vulkan 图形上下文
///
/// 管理所有 Vulkan 核心资源，包括实例、设备、队列、内存分配器等。
/// 显式构造、显式传递（`&Gfx` / `Rc<Gfx>`），仅适用于单线程环境；
/// "只有一个实例" 的约定通过运行时检查保证。
///
/// # 初始化流程
/// ```ignore
/// let gfx = Rc::new(Gfx::new("MyApp", extra_extensions));
/// let buffer = GfxBuffer::new(&gfx, ...);
/// // 使用...
/// gfx.destroy();
/// ```
pub struct Gfx {
    /// vk 基础函数的接口
    ///
    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    _vk_entry: ash::Entry,

    pub(crate) instance: GfxInstance,
    pub(crate) physical_device: GfxPhysicalDevice,

    /// Vulkan 设备函数指针集合
    ///
    /// 多个组件（queue、command buffer、fence 等）需要共享相同的设备函数指针，
    /// 函数指针本身很轻量，使用 Rc 共享
    pub(crate) device: Rc<GfxDevice>,

    pub(crate) debug_messenger: DebugMsger,

    pub(crate) gfx_queue: GfxCommandQueue,

    pub(crate) vm_allocator: VMemAllocator,

    imm_ctx: ImmediateContext,
}

// 创建与销毁
impl Gfx {
    const ENGINE_NAME: &'static str = "Corvus";

    pub fn new(app_name: &str, instance_extra_exts: Vec<&'static CStr>) -> Self {
        assert!(!GFX_ALIVE.swap(true, Ordering::SeqCst), "Gfx already initialized");

        let vk_entry = unsafe { ash::Entry::load() }.expect("failed to load vulkan entry");
        let instance = GfxInstance::new(&vk_entry, app_name, Self::ENGINE_NAME, instance_extra_exts);
        let debug_messenger = DebugMsger::new(&vk_entry, instance.ash_instance());
        let physical_device = GfxPhysicalDevice::new_discrete_physical_device(instance.ash_instance());

        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(physical_device.gfx_queue_family.queue_family_index)
            .queue_priorities(&[1.0])];
        let device = Rc::new(GfxDevice::new(
            instance.ash_instance(),
            physical_device.vk_handle,
            &queue_create_infos,
        ));

        let gfx_queue = GfxCommandQueue {
            vk_queue: unsafe {
                device.get_device_queue(physical_device.gfx_queue_family.queue_family_index, 0)
            },
            queue_family: physical_device.gfx_queue_family.clone(),
            device: device.clone(),
        };
        log::info!("gfx queue's queue family:\n{:#?}", gfx_queue.queue_family);

        let vm_allocator =
            VMemAllocator::new(instance.ash_instance(), physical_device.vk_handle, device.ash_handle());

        let imm_ctx = ImmediateContext::new(device.clone(), physical_device.gfx_queue_family.clone());

        device.set_object_debug_name(instance.vk_instance(), "GfxInstance");
        device.set_object_debug_name(device.vk_handle(), "GfxDevice");
        device.set_object_debug_name(gfx_queue.vk_queue, "GfxCommandQueue-gfx");

        Self {
            _vk_entry: vk_entry,
            instance,
            physical_device,
            device,
            debug_messenger,
            gfx_queue,
            vm_allocator,
            imm_ctx,
        }
    }

    pub fn destroy(self) {
        self.imm_ctx.destroy();
        self.vm_allocator.destroy();

        // device 的 Rc 分散在各个子对象中，销毁前它们都应当已不再访问 device
        self.device.destroy();

        self.debug_messenger.destroy();
        self.physical_device.destroy();
        self.instance.destroy();

        GFX_ALIVE.store(false, Ordering::SeqCst);
    }
}

// getter
impl Gfx {
    #[inline]
    pub fn entry(&self) -> &ash::Entry {
        &self._vk_entry
    }

    #[inline]
    pub fn instance(&self) -> &GfxInstance {
        &self.instance
    }

    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.physical_device
    }

    #[inline]
    pub fn gfx_queue(&self) -> &GfxCommandQueue {
        &self.gfx_queue
    }

    #[inline]
    pub fn allocator(&self) -> &VMemAllocator {
        &self.vm_allocator
    }
}

// tools
impl Gfx {
    /// 从候选格式中找到第一个支持的格式
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Option<vk::Format> {
        self.physical_device
            .filter_supported_formats(self.instance.ash_instance(), candidates, tiling, features)
            .first()
            .copied()
    }

    /// 立即执行某个 command，并同步等待执行结果
    #[inline]
    pub fn immediate_submit<F, R>(&self, func: F) -> R
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        self.imm_ctx.submit(&self.gfx_queue, func)
    }

    pub fn wait_idle(&self) {
        unsafe {
            self.device.device_wait_idle().unwrap();
        }
    }
}
