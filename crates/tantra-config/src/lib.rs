pub mod config;
pub mod manager;

pub use config::{
    ApiConfig, AuthConfig, Config, ConfigError, ConfigResult, LogLevel, LoggingConfig,
    RealtimeConfig, StorageConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 获取 Tantra 配置目录路径
pub fn tantra_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tantra"))
}

/// 获取默认本地状态目录（store 快照与凭证）
pub fn default_state_dir() -> Option<PathBuf> {
    tantra_dir().map(|dir| dir.join("state"))
}

/// 创建 `~/.tantra` 与状态目录
pub async fn init_tantra_dirs() -> ConfigResult<()> {
    if let Some(state) = default_state_dir() {
        tokio::fs::create_dir_all(&state).await?;
    }
    Ok(())
}

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(rest))
    } else {
        Some(PathBuf::from(path))
    }
}
