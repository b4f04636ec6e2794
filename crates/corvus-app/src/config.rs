use std::path::Path;

use serde::Deserialize;

/// 应用配置，从工作目录下的 corvus.toml 读取（可选）
#[derive(Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window_width: u32,
    pub window_height: u32,

    /// 启动时加载的 glTF 场景
    pub scene_path: Option<String>,
    /// 启动时加载的 OBJ 模型
    pub model_paths: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            scene_path: None,
            model_paths: vec![],
        }
    }
}

impl AppConfig {
    /// 配置文件缺失时使用默认值；解析失败记录日志后同样回退默认
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path).map_err(anyhow::Error::from).and_then(|content| {
            toml::from_str::<AppConfig>(&content).map_err(anyhow::Error::from)
        }) {
            Ok(config) => config,
            Err(e) => {
                log::error!("failed to load config {:?}: {e:#}", path);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_when_file_missing() {
        let config = AppConfig::load("does-not-exist.toml");
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 720);
        assert!(config.scene_path.is_none());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig = toml::from_str("window_width = 1920").unwrap();
        assert_eq!(config.window_width, 1920);
        assert_eq!(config.window_height, 720);
        assert!(config.model_paths.is_empty());
    }
}
