//! Corvus 渲染器
//!
//! 帧循环与同步（double buffering + fence/semaphore）、deferred destruction、
//! mesh/texture 上传、场景图与 draw list 构建、
//! 以及 compute 背景 / geometry / post-process / UI 四个 pass。

pub mod background;
pub mod deletion_queue;
pub mod draw_list;
pub mod frame;
pub mod framebuffers;
pub mod gltf_scene;
pub mod material;
pub mod model_upload;
pub mod renderer;
pub mod scene;
pub mod stats;
pub mod ui_pass;
pub mod upload;
