//! # AppStore
//!
//! 可克隆的共享状态句柄。每次变更都在一次写锁内完成，
//! 读取方只会看到变更前或变更后的完整状态。

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tantra_core::{
    ChatSession, ConnectionStatus, DeliveryState, ErrorCategory, ErrorLogEntry, EvolutionStatus,
    LearningStats, MemoryStats, Message, SystemStatus,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::StoreResult;
use crate::kv::{KeyValueStore, MemoryKeyValueStore};
use crate::snapshot;
use crate::state::StoreState;
use crate::DEFAULT_STORE_KEY;

struct Inner {
    state: RwLock<StoreState>,
    revision: watch::Sender<u64>,
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

/// 客户端状态存储
#[derive(Clone)]
pub struct AppStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AppStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppStore")
            .field("key", &self.inner.key)
            .field("revision", &*self.inner.revision.borrow())
            .finish()
    }
}

impl AppStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(StoreState::default()),
                revision,
                backend,
                key: key.into(),
            }),
        }
    }

    /// 仅内存、不落盘的存储
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKeyValueStore::new()), DEFAULT_STORE_KEY)
    }

    pub fn backend(&self) -> Arc<dyn KeyValueStore> {
        self.inner.backend.clone()
    }

    /// 订阅变更通知，每次变更后版本号加一
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn update<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let result = {
            let mut state = self.inner.state.write();
            f(&mut state)
        };
        self.inner.revision.send_modify(|r| *r = r.wrapping_add(1));
        result
    }

    fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.inner.state.read())
    }

    /// 当前状态的只读副本
    pub fn snapshot(&self) -> StoreState {
        self.read(|s| s.clone())
    }

    // ========== UI ==========

    pub fn set_sidebar_open(&self, open: bool) {
        self.update(|s| s.sidebar_open = open);
    }

    pub fn set_current_page(&self, page: impl Into<String>) {
        let page = page.into();
        self.update(|s| s.current_page = page);
    }

    pub fn set_loading(&self, loading: bool) {
        self.update(|s| s.loading = loading);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.update(|s| s.error = error);
    }

    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    // ========== Chat ==========

    /// 追加消息，保持插入顺序
    pub fn add_message(&self, message: Message) {
        self.update(|s| s.messages.push(message));
    }

    pub fn clear_messages(&self) {
        self.update(|s| s.messages.clear());
    }

    pub fn messages(&self) -> Vec<Message> {
        self.read(|s| s.messages.clone())
    }

    pub fn set_typing(&self, typing: bool) {
        self.update(|s| s.is_typing = typing);
    }

    pub fn is_typing(&self) -> bool {
        self.read(|s| s.is_typing)
    }

    pub fn set_connection_status(&self, status: ConnectionStatus) {
        self.update(|s| s.connection_status = status);
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.read(|s| s.connection_status)
    }

    /// 更新当前消息列表中某条消息的投递状态，消息不存在时返回 false
    pub fn set_message_delivery(&self, id: &str, delivery: DeliveryState) -> bool {
        self.update(|s| match s.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.delivery = delivery;
                true
            }
            None => false,
        })
    }

    // ========== Sessions ==========

    /// 新建会话并设为当前会话，清空当前消息列表
    pub fn create_new_session(&self) -> String {
        let session = ChatSession::new();
        let id = session.id.clone();
        self.update(|s| {
            s.sessions.push(session);
            s.current_session_id = Some(id.clone());
            s.messages.clear();
        });
        info!("Created chat session {}", id);
        id
    }

    /// 切换到已有会话，未知 id 时不做任何修改
    pub fn load_session(&self, id: &str) -> bool {
        self.update(|s| {
            let Some(messages) = s.session(id).map(|session| session.messages.clone()) else {
                return false;
            };
            s.current_session_id = Some(id.to_string());
            s.messages = messages;
            true
        })
    }

    /// 把当前消息列表写回当前会话
    pub fn save_current_session(&self) {
        self.update(|s| {
            let Some(current) = s.current_session_id.clone() else {
                return;
            };
            let messages = s.messages.clone();
            if let Some(session) = s.sessions.iter_mut().find(|session| session.id == current) {
                session.messages = messages;
                session.updated_at = Utc::now();
            }
        });
    }

    pub fn delete_session(&self, id: &str) {
        self.update(|s| {
            s.sessions.retain(|session| session.id != id);
            if s.current_session_id.as_deref() == Some(id) {
                s.current_session_id = None;
                s.messages.clear();
            }
        });
    }

    pub fn sessions(&self) -> Vec<ChatSession> {
        self.read(|s| s.sessions.clone())
    }

    pub fn current_session_id(&self) -> Option<String> {
        self.read(|s| s.current_session_id.clone())
    }

    // ========== Error log ==========

    pub fn log_error(
        &self,
        category: ErrorCategory,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> ErrorLogEntry {
        let entry = ErrorLogEntry::new(category, message, details);
        debug!("Logged {} error: {}", entry.category, entry.message);
        self.update(|s| {
            s.errors.push(entry.clone());
            s.last_error = Some(entry.clone());
        });
        entry
    }

    pub fn clear_errors(&self) {
        self.update(|s| {
            s.errors.clear();
            s.last_error = None;
        });
    }

    pub fn mark_error_resolved(&self, id: &str) -> bool {
        self.update(|s| {
            let mut found = false;
            for entry in s.errors.iter_mut().filter(|e| e.id == id) {
                entry.resolved = true;
                found = true;
            }
            if let Some(last) = s.last_error.as_mut().filter(|e| e.id == id) {
                last.resolved = true;
            }
            found
        })
    }

    pub fn errors(&self) -> Vec<ErrorLogEntry> {
        self.read(|s| s.errors.clone())
    }

    pub fn last_error(&self) -> Option<ErrorLogEntry> {
        self.read(|s| s.last_error.clone())
    }

    // ========== System ==========

    pub fn set_system_status(&self, status: SystemStatus) {
        self.update(|s| s.system_status = Some(status));
    }

    pub fn set_memory_stats(&self, stats: MemoryStats) {
        self.update(|s| s.memory_stats = Some(stats));
    }

    pub fn set_learning_stats(&self, stats: LearningStats) {
        self.update(|s| s.learning_stats = Some(stats));
    }

    pub fn set_evolution_status(&self, status: EvolutionStatus) {
        self.update(|s| s.evolution_status = Some(status));
    }

    /// 回到初始状态
    pub fn reset(&self) {
        self.update(|s| *s = StoreState::default());
    }

    // ========== Persistence ==========

    /// 从后端加载快照
    ///
    /// 快照缺失、损坏或版本过新时保持当前状态并返回 false。
    pub async fn hydrate(&self) -> StoreResult<bool> {
        let Some(raw) = self.inner.backend.get(&self.inner.key).await? else {
            debug!("No persisted state under {}", self.inner.key);
            return Ok(false);
        };

        match snapshot::decode(&raw) {
            Ok(restored) => {
                self.update(|s| *s = restored);
                info!("Hydrated store from {}", self.inner.key);
                Ok(true)
            }
            Err(e) => {
                warn!("Ignoring persisted state under {}: {}", self.inner.key, e);
                Ok(false)
            }
        }
    }

    /// 写入当前状态快照
    pub async fn persist(&self) -> StoreResult<()> {
        let raw = self.read(snapshot::encode)?;
        self.inner.backend.set(&self.inner.key, &raw).await?;
        debug!("Persisted store to {}", self.inner.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantra_core::Role;

    #[test]
    fn test_add_message_preserves_order() {
        let store = AppStore::in_memory();
        let contents: Vec<String> = (0..20).map(|i| format!("message {}", i)).collect();
        for content in &contents {
            store.add_message(Message::user(content.clone()));
        }

        let messages = store.messages();
        assert_eq!(messages.len(), contents.len());
        for (message, content) in messages.iter().zip(&contents) {
            assert_eq!(&message.content, content);
        }
    }

    #[test]
    fn test_create_then_save_stores_live_messages() {
        let store = AppStore::in_memory();
        store.add_message(Message::user("before"));

        let id = store.create_new_session();
        assert!(store.messages().is_empty());
        assert_eq!(store.current_session_id().as_deref(), Some(id.as_str()));

        store.add_message(Message::user("q"));
        store.add_message(Message::assistant("a", None));
        store.save_current_session();

        let state = store.snapshot();
        let session = state.current_session().unwrap();
        assert_eq!(session.messages, state.messages);
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_save_without_current_session_is_noop() {
        let store = AppStore::in_memory();
        store.add_message(Message::user("orphan"));
        store.save_current_session();
        assert!(store.sessions().is_empty());
    }

    #[test]
    fn test_load_and_delete_session() {
        let store = AppStore::in_memory();
        let first = store.create_new_session();
        store.add_message(Message::user("first"));
        store.save_current_session();

        let second = store.create_new_session();
        assert!(store.messages().is_empty());

        assert!(store.load_session(&first));
        assert_eq!(store.messages()[0].content, "first");

        assert!(!store.load_session("missing"));
        assert_eq!(store.current_session_id().as_deref(), Some(first.as_str()));

        store.delete_session(&second);
        assert_eq!(store.sessions().len(), 1);
        assert_eq!(store.messages().len(), 1);

        store.delete_session(&first);
        assert!(store.current_session_id().is_none());
        assert!(store.messages().is_empty());
    }

    #[test]
    fn test_error_log() {
        let store = AppStore::in_memory();
        let first = store.log_error(ErrorCategory::Connection, "refused", None);
        let second = store.log_error(
            ErrorCategory::Message,
            "send failed",
            Some(serde_json::json!({"attempt": 2})),
        );

        assert_eq!(store.errors().len(), 2);
        assert_eq!(store.last_error().unwrap().id, second.id);

        assert!(store.mark_error_resolved(&first.id));
        assert!(!store.mark_error_resolved("nope"));
        assert_eq!(store.snapshot().unresolved_errors(), 1);

        store.clear_errors();
        assert!(store.errors().is_empty());
        assert!(store.last_error().is_none());
    }

    #[test]
    fn test_message_delivery() {
        let store = AppStore::in_memory();
        let message = Message::user("hello");
        let id = message.id.clone();
        store.add_message(message);

        assert!(store.set_message_delivery(&id, DeliveryState::Failed));
        assert!(store.messages()[0].is_failed());
        assert!(!store.set_message_delivery("other", DeliveryState::Sent));
    }

    #[test]
    fn test_reset_and_revision() {
        let store = AppStore::in_memory();
        let rx = store.subscribe();
        let before = *rx.borrow();

        store.set_sidebar_open(false);
        store.set_current_page("chat");
        store.set_typing(true);
        assert!(*rx.borrow() > before);

        store.reset();
        let state = store.snapshot();
        assert_eq!(state, StoreState::default());
    }

    #[tokio::test]
    async fn test_hydrate_restores_sessions_but_not_status() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let store = AppStore::new(backend.clone(), DEFAULT_STORE_KEY);
        store.create_new_session();
        store.add_message(Message::user("persist me"));
        store.save_current_session();
        store.set_connection_status(ConnectionStatus::Connected);
        store.set_typing(true);
        store.persist().await.unwrap();

        let restored = AppStore::new(backend, DEFAULT_STORE_KEY);
        assert!(restored.hydrate().await.unwrap());

        let state = restored.snapshot();
        assert_eq!(state.sessions.len(), 1);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].content, "persist me");
        assert_eq!(state.connection_status, ConnectionStatus::Disconnected);
        assert!(!state.is_typing);
    }

    #[tokio::test]
    async fn test_hydrate_ignores_corrupt_payload() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        backend.set(DEFAULT_STORE_KEY, "{broken").await.unwrap();

        let store = AppStore::new(backend, DEFAULT_STORE_KEY);
        assert!(!store.hydrate().await.unwrap());
        assert_eq!(store.snapshot(), StoreState::default());
    }
}
