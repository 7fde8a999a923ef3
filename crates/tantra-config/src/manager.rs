use crate::config::{Config, ConfigError, ConfigResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// 配置管理器
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    /// 加载配置文件，不存在时写入默认配置
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                info!("Loading config from {:?}", path);
                let config: Config = serde_json::from_str(&Self::expand_env_vars(&raw)?)?;
                Self::validate(&config)?;
                Ok(Self::new(config, path.to_path_buf()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {:?}, writing defaults", path);
                let manager = Self::new(Config::default(), path.to_path_buf());
                manager.save().await?;
                Ok(manager)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 创建一个新的配置管理器（不读文件）
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// 获取当前配置的副本
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// 写回配置文件
    pub async fn save(&self) -> ConfigResult<()> {
        let content = {
            let config = self.config.read().await;
            serde_json::to_string_pretty(&*config)?
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    /// 修改配置并保存；闭包返回错误时不保存
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        let mut config = self.config.write().await;
        let mut candidate = config.clone();
        f(&mut candidate)?;
        Self::validate(&candidate)?;
        *config = candidate;
        drop(config);
        self.save().await
    }

    /// 验证配置
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.api.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "api.base_url cannot be empty".to_string(),
            ));
        }

        if config.api.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "api.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if config.realtime.reconnection_attempts == 0 {
            return Err(ConfigError::Validation(
                "realtime.reconnection_attempts must be at least 1".to_string(),
            ));
        }

        if config.realtime.enabled {
            let url = &config.realtime.url;
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ConfigError::Validation(format!(
                    "realtime.url must start with ws:// or wss://, got '{}'",
                    url
                )));
            }
        }

        if config.storage.store_key.is_empty() || config.storage.token_key.is_empty() {
            return Err(ConfigError::Validation(
                "storage keys cannot be empty".to_string(),
            ));
        }

        if config.storage.store_key == config.storage.token_key {
            return Err(ConfigError::Validation(
                "storage.store_key and storage.token_key must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// 展开 `${VAR}` 与 `${VAR:-default}`；未设置且无默认值时报错
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let mut expanded = String::with_capacity(content.len());
        let mut last = 0;

        for cap in ENV_VAR_PATTERN.captures_iter(content) {
            let Some(whole) = cap.get(0) else { continue };
            let expr = &cap[1];
            let (name, fallback) = match expr.split_once(":-") {
                Some((name, fallback)) => (name, Some(fallback)),
                None => (expr, None),
            };

            let value = match (std::env::var(name), fallback) {
                (Ok(value), _) => value,
                (Err(_), Some(fallback)) => fallback.to_string(),
                (Err(_), None) => return Err(ConfigError::EnvVarNotFound(name.to_string())),
            };

            expanded.push_str(&content[last..whole.start()]);
            expanded.push_str(&value);
            last = whole.end();
        }

        expanded.push_str(&content[last..]);
        Ok(expanded)
    }
}
