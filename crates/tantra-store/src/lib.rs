//! # Tantra Store
//!
//! 控制台客户端的状态存储：
//!
//! - [`AppStore`]：UI、聊天、会话、错误日志、系统快照的共享状态与变更入口
//! - [`KeyValueStore`]：持久化后端（文件目录 / 内存）
//! - [`snapshot`]：带版本号的序列化边界
//! - [`CredentialStore`]：Bearer 凭证的内存副本与持久化

pub mod credentials;
pub mod error;
pub mod kv;
pub mod snapshot;
pub mod state;
pub mod store;

pub use credentials::CredentialStore;
pub use error::{StoreError, StoreResult};
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use snapshot::SNAPSHOT_VERSION;
pub use state::StoreState;
pub use store::AppStore;

/// 默认的状态存储键
pub const DEFAULT_STORE_KEY: &str = "agi-store";

/// 默认的凭证存储键
pub const DEFAULT_TOKEN_KEY: &str = "agi_token";
