//! 结构化日志模块
//!
//! 安装 tracing-subscriber：可重载的 EnvFilter、文本或 JSON 输出到 stderr，
//! 以及可选的按天滚动日志文件。

use std::path::Path;

use tantra_config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    layer::{Layered, SubscriberExt},
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::error::{ObservabilityError, Result};

type ReloadHandle = Handle<EnvFilter, Registry>;
type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// 日志管理器
///
/// 必须在进程存活期间持有，文件写入的后台线程随它一起结束。
#[derive(Debug)]
pub struct LogManager {
    level: String,
    reload_handle: ReloadHandle,
    _file_guard: Option<WorkerGuard>,
}

impl LogManager {
    /// 按配置安装全局 subscriber
    ///
    /// `RUST_LOG` 存在时优先于配置中的级别。
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.level.to_string());
        let filter = build_filter(&level)?;
        let (filter, reload_handle) = reload::Layer::new(filter);

        let mut layers: Vec<BoxedLayer> = Vec::new();

        if config.json {
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .boxed(),
            );
        } else {
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr)
                    .boxed(),
            );
        }

        let mut file_guard = None;
        if let Some(ref file) = config.file {
            let path = tantra_config::expand_tilde(file)
                .ok_or_else(|| ObservabilityError::LogFile("could not resolve path".into()))?;
            let (writer, guard) = file_writer(&path)?;
            file_guard = Some(guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            );
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(layers)
            .try_init()
            .map_err(|e| ObservabilityError::Subscriber(e.to_string()))?;

        tracing::info!(
            target: "tantra_observability",
            "Log manager initialized with level: {}",
            level
        );

        Ok(Self {
            level,
            reload_handle,
            _file_guard: file_guard,
        })
    }

    /// 动态更新日志级别
    pub fn update_level(&mut self, level: &str) -> Result<()> {
        let new_filter = build_filter(level)?;
        self.reload_handle
            .modify(|filter| *filter = new_filter)
            .map_err(|e| ObservabilityError::Subscriber(e.to_string()))?;
        self.level = level.to_string();

        tracing::info!(
            target: "tantra_observability",
            "Log level updated to: {}",
            level
        );
        Ok(())
    }

    /// 当前生效的过滤表达式
    pub fn level(&self) -> &str {
        &self.level
    }
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| ObservabilityError::InvalidFilter(e.to_string()))
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| ObservabilityError::LogFile(path.display().to_string()))?;
    let appender = tracing_appender::rolling::daily(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// 创建带有会话上下文的 span
pub fn create_session_span(session_id: Option<&str>) -> tracing::Span {
    tracing::info_span!(
        "chat_session",
        session_id = session_id.unwrap_or("none"),
    )
}
