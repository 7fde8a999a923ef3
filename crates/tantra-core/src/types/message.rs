use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique message identifier
pub type MessageId = String;

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// Delivery state of a locally created message.
///
/// User messages start as `Pending` when appended optimistically. They move to
/// `Sent` once pushed over the realtime channel, to `Delivered` once the HTTP
/// fallback answered, or to `Failed` when both paths failed. Messages that came
/// from the server are `Delivered` from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    Sent,
    #[default]
    Delivered,
    Failed,
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryState::Pending => write!(f, "pending"),
            DeliveryState::Sent => write!(f, "sent"),
            DeliveryState::Delivered => write!(f, "delivered"),
            DeliveryState::Failed => write!(f, "failed"),
        }
    }
}

/// Optional metadata attached to assistant replies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    #[serde(default)]
    pub delivery: DeliveryState,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>, delivery: DeliveryState) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
            metadata: None,
            delivery,
        }
    }

    /// Create a user message awaiting delivery
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content, DeliveryState::Pending)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>, metadata: Option<MessageMetadata>) -> Self {
        let mut message = Self::with_role(Role::Assistant, content, DeliveryState::Delivered);
        message.metadata = metadata;
        message
    }

    pub fn is_failed(&self) -> bool {
        self.delivery == DeliveryState::Failed
    }
}
