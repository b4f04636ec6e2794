use std::path::Path;

use anyhow::Context;
use ash::vk;

use crate::gfx::Gfx;

/// 从文件加载的 SPIR-V shader module
///
/// 加载失败是可恢复的：调用方应当记录日志并跳过对应的 pipeline，
/// 而不是让整个引擎退出
pub struct ShaderModule {
    handle: vk::ShaderModule,
}

// init & destroy
impl ShaderModule {
    /// 读取预编译的 SPIR-V 二进制文件并创建 shader module
    ///
    /// 字节流会被重新解释为 32-bit word，因此文件大小必须是 4 的整数倍
    pub fn load(gfx: &Gfx, path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("failed to open shader file: {:?}", path))?;
        anyhow::ensure!(
            bytes.len() % 4 == 0,
            "shader file {:?} size ({}) is not 4-byte aligned, not a valid SPIR-V blob",
            path,
            bytes.len()
        );

        // Vec<u8> 不保证 4 字节对齐，拷贝成 word 数组
        let words = bytes
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect::<Vec<_>>();

        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
        let handle = unsafe {
            gfx.device()
                .create_shader_module(&create_info, None)
                .with_context(|| format!("failed to create shader module from {:?}", path))?
        };

        Ok(Self { handle })
    }

    pub fn destroy(self, gfx: &Gfx) {
        unsafe {
            gfx.device().destroy_shader_module(self.handle, None);
        }
    }
}

// getter
impl ShaderModule {
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}
