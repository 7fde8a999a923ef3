//! # Key-Value Backends
//!
//! 持久化后端 trait 与两个实现：
//!
//! ```text
//! <dir>/
//! ├── agi-store.json   # 状态快照
//! └── agi_token.json   # Bearer 凭证
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// 持久化后端 trait
///
/// 值是不透明的字符串，序列化由调用方负责。
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取键值，不存在时返回 `None`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// 写入键值（完整替换）
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// 删除键值，不存在时不报错
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey {
            key: key.to_string(),
        })
    }
}

/// 基于目录的存储，每个键一个 JSON 文件
///
/// 写入先落到临时文件再 rename，Unix 下文件权限为 0600。
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

/// 创建新文件并写入，Unix 下创建时即为 0600
async fn write_private(path: &Path, value: &str) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(value.as_bytes()).await?;
    file.sync_all().await
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).await?;

        // 每次写入独立的临时文件，并发写同一个键时 rename 仍然原子
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key, Uuid::new_v4().simple()));
        if let Err(e) = write_private(&tmp, value).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!("Wrote key {} to {:?}", key, path);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 内存存储，用于测试和无持久化的场景
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        validate_key(key)?;
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_roundtrip_and_remove() {
        let temp = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(temp.path().join("state"));

        assert_eq!(store.get("agi-store").await.unwrap(), None);

        store.set("agi-store", "{\"a\":1}").await.unwrap();
        assert_eq!(
            store.get("agi-store").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert!(temp.path().join("state").join("agi-store.json").exists());
        assert_eq!(std::fs::read_dir(temp.path().join("state")).unwrap().count(), 1);

        store.remove("agi-store").await.unwrap();
        assert_eq!(store.get("agi-store").await.unwrap(), None);
        // 再删一次也不报错
        store.remove("agi-store").await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let store = FileKeyValueStore::new(temp.path());
        store.set("agi_token", "secret").await.unwrap();

        let meta = std::fs::metadata(temp.path().join("agi_token.json")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_concurrent_sets_leave_valid_json() {
        let temp = TempDir::new().unwrap();
        let store = std::sync::Arc::new(FileKeyValueStore::new(temp.path()));

        for round in 0..20 {
            let mut handles = Vec::new();
            for writer in 0..8usize {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    let payload = serde_json::json!({
                        "round": round,
                        "writer": writer,
                        "padding": "x".repeat(writer * 4096),
                    });
                    store.set("agi-store", &payload.to_string()).await
                }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            let raw = store.get("agi-store").await.unwrap().unwrap();
            let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(value["round"], round);
        }

        // 没有残留的临时文件
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let store = MemoryKeyValueStore::new();
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                store.set(key, "x").await,
                Err(StoreError::InvalidKey { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);
        store.remove("k").await.unwrap();
        assert!(store.is_empty());
    }
}
