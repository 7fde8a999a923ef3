use serde::{Deserialize, Serialize};

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            api: ApiConfig::default(),
            realtime: RealtimeConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 获取配置值的快捷方法
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["api", "base_url"] => Some(self.api.base_url.clone()),
            ["api", "timeout_seconds"] => Some(self.api.timeout_seconds.to_string()),
            ["realtime", "enabled"] => Some(self.realtime.enabled.to_string()),
            ["realtime", "url"] => Some(self.realtime.url.clone()),
            ["realtime", "reconnection_attempts"] => {
                Some(self.realtime.reconnection_attempts.to_string())
            }
            ["realtime", "reconnection_delay_ms"] => {
                Some(self.realtime.reconnection_delay_ms.to_string())
            }
            ["storage", "path"] => self.storage.path.clone(),
            ["storage", "store_key"] => Some(self.storage.store_key.clone()),
            ["storage", "token_key"] => Some(self.storage.token_key.clone()),
            ["auth", "fallback_path"] => Some(self.auth.fallback_path.clone()),
            ["logging", "level"] => Some(self.logging.level.to_string()),
            ["logging", "file"] => self.logging.file.clone(),
            ["logging", "json"] => Some(self.logging.json.to_string()),
            _ => None,
        }
    }

    /// 设置配置值
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["api", "base_url"] => {
                self.api.base_url = value.trim_end_matches('/').to_string();
            }
            ["api", "timeout_seconds"] => {
                self.api.timeout_seconds = parse_number(value)?;
            }
            ["realtime", "enabled"] => {
                self.realtime.enabled = parse_bool(value)?;
            }
            ["realtime", "url"] => {
                self.realtime.url = value.to_string();
            }
            ["realtime", "reconnection_attempts"] => {
                self.realtime.reconnection_attempts = parse_number(value)?;
            }
            ["realtime", "reconnection_delay_ms"] => {
                self.realtime.reconnection_delay_ms = parse_number(value)?;
            }
            ["storage", "path"] => {
                self.storage.path = Some(value.to_string());
            }
            ["storage", "store_key"] => {
                self.storage.store_key = value.to_string();
            }
            ["storage", "token_key"] => {
                self.storage.token_key = value.to_string();
            }
            ["auth", "fallback_path"] => {
                self.auth.fallback_path = value.to_string();
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "file"] => {
                self.logging.file = Some(value.to_string());
            }
            ["logging", "json"] => {
                self.logging.json = parse_bool(value)?;
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> ConfigResult<bool> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid boolean: {}", value)))
}

fn parse_number<T: std::str::FromStr>(value: &str) -> ConfigResult<T> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid number: {}", value)))
}

/// REST API 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    /// 单个请求超时（秒）
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// 实时通道配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeConfig {
    /// 是否启用实时通道
    pub enabled: bool,
    /// WebSocket 地址 (e.g., "ws://localhost:8000/ws")
    pub url: String,
    /// 自动重连的最大尝试次数
    pub reconnection_attempts: u32,
    /// 两次尝试之间的固定间隔（毫秒）
    pub reconnection_delay_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "ws://localhost:8000/ws".to_string(),
            reconnection_attempts: 5,
            reconnection_delay_ms: 1000,
        }
    }
}

/// 本地持久化配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    pub path: Option<String>,
    /// store 快照使用的键
    pub store_key: String,
    /// bearer 凭证使用的键
    pub token_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: Some("~/.tantra/state".to_string()),
            store_key: "agi-store".to_string(),
            token_key: "agi_token".to_string(),
        }
    }
}

/// 认证相关配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// 未认证时重定向的位置
    pub fallback_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            fallback_path: "/auth".to_string(),
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// 日志文件路径，None 表示只输出到 stderr
    pub file: Option<String>,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            json: false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.realtime.reconnection_attempts, 5);
        assert_eq!(config.realtime.reconnection_delay_ms, 1000);
        assert_eq!(config.storage.store_key, "agi-store");
        assert_eq!(config.storage.token_key, "agi_token");
        assert_eq!(config.auth.fallback_path, "/auth");
    }

    #[test]
    fn test_get_set_roundtrip_through_keys() {
        let mut config = Config::default();
        config.set_value("api.base_url", "https://agi.example.com/").unwrap();
        config.set_value("realtime.reconnection_attempts", "3").unwrap();
        config.set_value("logging.level", "WARNING").unwrap();

        assert_eq!(
            config.get_value("api.base_url").as_deref(),
            Some("https://agi.example.com")
        );
        assert_eq!(
            config.get_value("realtime.reconnection_attempts").as_deref(),
            Some("3")
        );
        assert_eq!(config.get_value("logging.level").as_deref(), Some("warn"));
    }

    #[test]
    fn test_set_value_rejects_bad_input() {
        let mut config = Config::default();
        assert!(matches!(
            config.set_value("realtime.enabled", "maybe"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            config.set_value("nope.key", "1"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let json = r#"{"version": "0.1.0", "api": {"base_url": "http://x", "timeout_seconds": 5}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.api.timeout_seconds, 5);
        assert_eq!(config.realtime, RealtimeConfig::default());
    }
}
