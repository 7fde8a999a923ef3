//! # Store Error Types
//!
//! 定义状态存储与持久化相关的错误类型。

use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 键名不合法（只允许字母、数字、`-`、`_`、`.`）
    #[error("Invalid storage key: {key}")]
    InvalidKey { key: String },

    /// 快照版本高于当前支持的版本
    #[error("Unsupported snapshot version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// 快照结构错误
    #[error("Malformed snapshot: {message}")]
    MalformedSnapshot { message: String },
}

impl StoreError {
    /// 创建快照结构错误
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            message: message.into(),
        }
    }
}

/// 存储结果类型
pub type StoreResult<T> = Result<T, StoreError>;
