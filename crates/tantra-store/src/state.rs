//! # Store State
//!
//! 所有客户端状态的单一结构。连接状态、输入中标记与加载标记是瞬时的，
//! 不参与序列化，反序列化时回到默认值。

use serde::{Deserialize, Serialize};
use tantra_core::{
    ChatSession, ConnectionStatus, ErrorLogEntry, EvolutionStatus, LearningStats, MemoryStats,
    Message, SystemStatus,
};

/// 客户端状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreState {
    // UI
    pub sidebar_open: bool,
    pub current_page: String,
    #[serde(skip)]
    pub loading: bool,
    pub error: Option<String>,

    // Chat
    pub messages: Vec<Message>,
    #[serde(skip)]
    pub is_typing: bool,
    #[serde(skip)]
    pub connection_status: ConnectionStatus,
    pub sessions: Vec<ChatSession>,
    pub current_session_id: Option<String>,

    // Error log
    pub errors: Vec<ErrorLogEntry>,
    pub last_error: Option<ErrorLogEntry>,

    // System snapshots
    pub system_status: Option<SystemStatus>,
    pub memory_stats: Option<MemoryStats>,
    pub learning_stats: Option<LearningStats>,
    pub evolution_status: Option<EvolutionStatus>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            sidebar_open: true,
            current_page: "dashboard".to_string(),
            loading: false,
            error: None,
            messages: Vec::new(),
            is_typing: false,
            connection_status: ConnectionStatus::Disconnected,
            sessions: Vec::new(),
            current_session_id: None,
            errors: Vec::new(),
            last_error: None,
            system_status: None,
            memory_stats: None,
            learning_stats: None,
            evolution_status: None,
        }
    }
}

impl StoreState {
    pub fn current_session(&self) -> Option<&ChatSession> {
        let id = self.current_session_id.as_deref()?;
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// 未解决的错误数量
    pub fn unresolved_errors(&self) -> usize {
        self.errors.iter().filter(|e| !e.resolved).count()
    }
}
