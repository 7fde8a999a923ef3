//! 日志初始化相关的错误类型

/// 观测性错误类型
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    /// 无法解析的日志级别或过滤指令
    #[error("Invalid log level: {0}")]
    InvalidFilter(String),

    /// 日志文件路径不可用
    #[error("Invalid log file: {0}")]
    LogFile(String),

    /// 全局 subscriber 已安装或重载失败
    #[error("Subscriber error: {0}")]
    Subscriber(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 结果类型
pub type Result<T> = std::result::Result<T, ObservabilityError>;
