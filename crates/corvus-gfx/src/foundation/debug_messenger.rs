use std::ffi::{c_void, CStr};

use ash::vk;

/// 可以被设置 debug name 的 vulkan 对象
///
/// debug name 的格式为 `TypeName::name`，在 validation layer 的消息和
/// RenderDoc 中都能看到
pub trait DebugType {
    fn debug_type_name() -> &'static str;

    fn vk_handle(&self) -> impl vk::Handle;
}

/// validation layer 的消息回调
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let callback_data = *p_callback_data;

    let msg = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("[vulkan][{:?}] {}", message_type, msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("[vulkan][{:?}] {}", message_type, msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::info!("[vulkan][{:?}] {}", message_type, msg),
        _ => log::debug!("[vulkan][{:?}] {}", message_type, msg),
    }

    // 返回 false 表示不中断产生该消息的 vulkan 调用
    vk::FALSE
}

pub struct DebugMsger {
    debug_utils_pf: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

// 创建与销毁
impl DebugMsger {
    pub fn new(vk_entry: &ash::Entry, instance: &ash::Instance) -> Self {
        let debug_utils_pf = ash::ext::debug_utils::Instance::new(vk_entry, instance);
        let messenger = unsafe {
            debug_utils_pf.create_debug_utils_messenger(&Self::debug_utils_messenger_ci(), None).unwrap()
        };

        Self {
            debug_utils_pf,
            messenger,
        }
    }

    pub fn destroy(self) {
        unsafe {
            self.debug_utils_pf.destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

impl DebugMsger {
    pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vk_debug_callback))
    }
}
