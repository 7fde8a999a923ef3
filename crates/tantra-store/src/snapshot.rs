//! # Persisted Snapshot
//!
//! 状态以 `{ "version": N, "state": { ... } }` 的形式写入单个键。
//!
//! - version 0：浏览器前端遗留的布局，字段为 camelCase（`chatSessions`、`errorLogs` ...）
//! - version 1：当前布局，即 [`StoreState`] 的 snake_case 序列化

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tantra_core::{
    ChatSession, ErrorLogEntry, EvolutionStatus, LearningStats, MemoryStats, Message,
    SystemStatus,
};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::state::StoreState;

/// 当前快照版本
pub const SNAPSHOT_VERSION: u32 = 1;

/// 持久化快照外层结构
#[derive(Serialize)]
struct Envelope<'a> {
    version: u32,
    state: &'a StoreState,
}

/// 序列化为当前版本的快照
pub fn encode(state: &StoreState) -> StoreResult<String> {
    Ok(serde_json::to_string(&Envelope {
        version: SNAPSHOT_VERSION,
        state,
    })?)
}

/// 解析并迁移快照
pub fn decode(raw: &str) -> StoreResult<StoreState> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(mut root) = value else {
        return Err(StoreError::malformed("snapshot is not a JSON object"));
    };

    let version = match root.get("version") {
        None => 0,
        Some(v) => v
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| StoreError::malformed("version is not an integer"))?,
    };

    let state = root
        .remove("state")
        .ok_or_else(|| StoreError::malformed("missing state"))?;

    match version {
        0 => {
            debug!("Migrating version 0 snapshot");
            let legacy: LegacyState = serde_json::from_value(state)?;
            Ok(legacy.into_state())
        }
        SNAPSHOT_VERSION => Ok(serde_json::from_value(state)?),
        found => Err(StoreError::UnsupportedVersion {
            found,
            supported: SNAPSHOT_VERSION,
        }),
    }
}

/// version 0 布局
///
/// 系统快照字段在旧布局里结构不稳定，解析失败时直接丢弃。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyState {
    #[serde(default = "default_true")]
    sidebar_open: bool,
    #[serde(default)]
    current_page: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    chat_sessions: Vec<ChatSession>,
    #[serde(default)]
    current_session_id: Option<String>,
    #[serde(default)]
    error_logs: Vec<ErrorLogEntry>,
    #[serde(default)]
    last_error: Option<ErrorLogEntry>,
    #[serde(default)]
    system_status: Option<Value>,
    #[serde(default)]
    memory_stats: Option<Value>,
    #[serde(default)]
    learning_stats: Option<Value>,
    #[serde(default)]
    evolution_status: Option<Value>,
}

fn default_true() -> bool {
    true
}

fn lenient<T: serde::de::DeserializeOwned>(value: Option<Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v).ok())
}

impl LegacyState {
    fn into_state(self) -> StoreState {
        let defaults = StoreState::default();
        StoreState {
            sidebar_open: self.sidebar_open,
            current_page: self.current_page.unwrap_or(defaults.current_page),
            error: self.error,
            messages: self.messages,
            sessions: self.chat_sessions,
            current_session_id: self.current_session_id,
            errors: self.error_logs,
            last_error: self.last_error,
            system_status: lenient::<SystemStatus>(self.system_status),
            memory_stats: lenient::<MemoryStats>(self.memory_stats),
            learning_stats: lenient::<LearningStats>(self.learning_stats),
            evolution_status: lenient::<EvolutionStatus>(self.evolution_status),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantra_core::Role;

    #[test]
    fn test_encode_decode_current_version() {
        let mut state = StoreState::default();
        state.messages.push(Message::user("hello"));
        state.current_page = "chat".to_string();

        let raw = encode(&state).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], SNAPSHOT_VERSION);

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_decode_legacy_layout() {
        let raw = r#"{
            "version": 0,
            "state": {
                "sidebarOpen": false,
                "currentPage": "chat",
                "messages": [{
                    "id": "1700000000000",
                    "content": "hi",
                    "role": "user",
                    "sender": "user",
                    "timestamp": "2024-01-01T10:00:00.000Z"
                }],
                "chatSessions": [{
                    "id": "1700000000001",
                    "title": "Chat 1/1/2024",
                    "messages": [],
                    "created_at": "2024-01-01T10:00:00.000Z",
                    "updated_at": "2024-01-01T10:00:00.000Z"
                }],
                "currentSessionId": "1700000000001",
                "errorLogs": [],
                "systemStatus": { "status": "healthy" }
            }
        }"#;

        let state = decode(raw).unwrap();
        assert!(!state.sidebar_open);
        assert_eq!(state.current_page, "chat");
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].role, Role::User);
        assert_eq!(state.sessions.len(), 1);
        assert_eq!(state.current_session_id.as_deref(), Some("1700000000001"));
        // 不完整的系统快照被丢弃
        assert!(state.system_status.is_none());
    }

    #[test]
    fn test_decode_rejects_future_version() {
        let raw = r#"{"version": 99, "state": {}}"#;
        assert!(matches!(
            decode(raw),
            Err(StoreError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("not json").is_err());
        assert!(decode("[1,2,3]").is_err());
        assert!(decode(r#"{"version": 1}"#).is_err());
    }
}
