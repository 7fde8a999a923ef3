//! Bearer credential held in memory and mirrored to durable storage.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::StoreResult;
use crate::kv::{KeyValueStore, MemoryKeyValueStore};
use crate::DEFAULT_TOKEN_KEY;

/// Bearer 凭证存储
///
/// 内存副本是权威值；持久化失败不会影响内存中的清除。
#[derive(Clone)]
pub struct CredentialStore {
    token: Arc<RwLock<Option<String>>>,
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("key", &self.key)
            .field("present", &self.token.read().is_some())
            .finish()
    }
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(None)),
            backend,
            key: key.into(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()), DEFAULT_TOKEN_KEY)
    }

    /// 从后端读取凭证到内存
    pub async fn load(&self) -> StoreResult<Option<String>> {
        let stored = self
            .backend
            .get(&self.key)
            .await?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        *self.token.write() = stored.clone();
        debug!("Loaded credential: present={}", stored.is_some());
        Ok(stored)
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn is_present(&self) -> bool {
        self.token.read().is_some()
    }

    pub async fn set(&self, token: impl Into<String>) -> StoreResult<()> {
        let token = token.into();
        *self.token.write() = Some(token.clone());
        self.backend.set(&self.key, &token).await
    }

    pub async fn clear(&self) -> StoreResult<()> {
        *self.token.write() = None;
        self.backend.remove(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_load_clear() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let creds = CredentialStore::new(backend.clone(), DEFAULT_TOKEN_KEY);
        assert!(!creds.is_present());

        creds.set("abc").await.unwrap();
        assert_eq!(creds.token().as_deref(), Some("abc"));

        let other = CredentialStore::new(backend.clone(), DEFAULT_TOKEN_KEY);
        assert_eq!(other.load().await.unwrap().as_deref(), Some("abc"));

        creds.clear().await.unwrap();
        assert!(creds.token().is_none());
        assert_eq!(backend.get(DEFAULT_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_stored_token_is_absent() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        backend.set(DEFAULT_TOKEN_KEY, "  \n").await.unwrap();

        let creds = CredentialStore::new(backend, DEFAULT_TOKEN_KEY);
        assert_eq!(creds.load().await.unwrap(), None);
        assert!(!creds.is_present());
    }

    #[tokio::test]
    async fn test_clones_share_token() {
        let creds = CredentialStore::in_memory();
        let clone = creds.clone();
        creds.set("shared").await.unwrap();
        assert_eq!(clone.token().as_deref(), Some("shared"));
    }
}
