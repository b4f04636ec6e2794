//! Corvus 的 GFX 层
//!
//! 对 ash/Vulkan 的薄封装：instance/device 的初始化、VMA 内存分配、
//! buffer/image 等资源、command 录制与提交、descriptor 管理、
//! pipeline 构建以及 swapchain。
//!
//! 约定：所有核心对象的创建失败都是 fatal 的（直接 unwrap），
//! 只有 pipeline 对象本身和 shader 加载是可恢复的。

pub mod commands;
pub mod descriptors;
pub mod foundation;
pub mod gfx;
pub mod pipelines;
pub mod resources;
pub mod swapchain;
