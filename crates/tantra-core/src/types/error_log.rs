use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an error originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Connection,
    Message,
    System,
    Ui,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Connection => write!(f, "connection"),
            ErrorCategory::Message => write!(f, "message"),
            ErrorCategory::System => write!(f, "system"),
            ErrorCategory::Ui => write!(f, "ui"),
        }
    }
}

/// One entry of the append-only error log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub resolved: bool,
}

impl ErrorLogEntry {
    pub fn new(
        category: ErrorCategory,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            category,
            message: message.into(),
            details,
            resolved: false,
        }
    }
}
