//! Tantra Observability
//!
//! 基于 tracing 的结构化日志初始化。

#![warn(missing_docs)]

pub mod error;
pub mod logging;

pub use error::{ObservabilityError, Result};
pub use logging::{create_session_span, LogManager};
