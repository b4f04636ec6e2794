use std::ptr;

use ash::vk;
use vk_mem::Alloc;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 由 VMA 分配内存的 buffer
///
/// 所有权归创建它的子系统；必须恰好销毁一次（`destroy`）。
/// 若销毁时可能仍有 GPU command 引用它，必须经由 deletion queue 延迟销毁。
pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    size: vk::DeviceSize,

    /// 在创建阶段写死；persistent mapping
    map_ptr: Option<*mut u8>,
    /// 只有在 buffer usage 包含 SHADER_DEVICE_ADDRESS 时才有值
    device_addr: Option<vk::DeviceAddress>,

    debug_name: String,
}

// init & destroy
impl GfxBuffer {
    /// - mem_map: 是否保持 CPU 侧的 persistent mapping。
    ///   VMA 会据此选择 host-visible 的 memory type
    pub fn new(
        gfx: &Gfx,
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        mem_map: bool,
        name: impl AsRef<str>,
    ) -> Self {
        let buffer_ci = vk::BufferCreateInfo::default().size(buffer_size).usage(buffer_usage);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: if mem_map {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };

        let (buffer, mut alloc) = unsafe { gfx.allocator().create_buffer(&buffer_ci, &alloc_ci).unwrap() };

        let mut map_ptr = None;
        if mem_map {
            map_ptr = Some(unsafe { gfx.allocator().map_memory(&mut alloc).unwrap() });
        }

        let mut device_addr = None;
        if buffer_usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS) {
            device_addr = Some(unsafe {
                gfx.device().get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer))
            });
        }

        let buffer = Self {
            handle: buffer,
            allocation: alloc,
            size: buffer_size,
            map_ptr,
            device_addr,
            debug_name: name.as_ref().to_string(),
        };
        gfx.device().set_debug_name(&buffer, name);
        buffer
    }

    /// 用于上传的 staging buffer：TRANSFER_SRC + persistent mapping
    #[inline]
    pub fn new_stage_buffer(gfx: &Gfx, size: vk::DeviceSize, debug_name: impl AsRef<str>) -> Self {
        Self::new(gfx, size, vk::BufferUsageFlags::TRANSFER_SRC, true, debug_name)
    }

    pub fn destroy(mut self, gfx: &Gfx) {
        log::debug!("destroying GfxBuffer: {}", self.debug_name);
        unsafe {
            if self.map_ptr.is_some() {
                gfx.allocator().unmap_memory(&mut self.allocation);
            }
            gfx.allocator().destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}

// getter
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn device_address(&self) -> vk::DeviceAddress {
        self.device_addr.expect("buffer usage does not contain SHADER_DEVICE_ADDRESS")
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn mapped_ptr(&self) -> *mut u8 {
        self.map_ptr.expect("buffer is not mapped")
    }
}

// tools
impl GfxBuffer {
    #[inline]
    pub fn flush(&self, gfx: &Gfx, offset: vk::DeviceSize, size: vk::DeviceSize) {
        gfx.allocator().flush_allocation(&self.allocation, offset, size).unwrap();
    }

    /// 通过 mem map 的方式将 data 写入 buffer
    pub fn transfer_data_by_mmap<T>(&self, gfx: &Gfx, data: &[T])
    where
        T: Sized + Copy,
    {
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr() as *const u8, self.mapped_ptr(), std::mem::size_of_val(data));
        }
        self.flush(gfx, 0, std::mem::size_of_val(data) as vk::DeviceSize);
    }

    /// 同上，但写入到 buffer 内的指定 offset 处
    pub fn transfer_data_by_mmap_offset<T>(&self, gfx: &Gfx, data: &[T], offset: vk::DeviceSize)
    where
        T: Sized + Copy,
    {
        unsafe {
            ptr::copy_nonoverlapping(
                data.as_ptr() as *const u8,
                self.mapped_ptr().add(offset as usize),
                std::mem::size_of_val(data),
            );
        }
        self.flush(gfx, offset, std::mem::size_of_val(data) as vk::DeviceSize);
    }
}

impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
