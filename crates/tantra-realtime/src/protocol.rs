//! Realtime protocol definitions
//!
//! Every text frame, in both directions, is a JSON envelope:
//!
//! ```text
//! {"event": "<name>", "data": <payload>}
//! ```
//!
//! Inbound frames are decoded by event name. Unknown names are ignored so the
//! server can add events without breaking older clients.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tantra_core::{
    ErrorCategory, EvolutionStatus, LearningStats, MemoryStats, Message, MessageMetadata,
    Notifier, SystemStatus,
};
use tantra_store::AppStore;
use tracing::{debug, warn};

use crate::error::{RealtimeError, RealtimeResult};

/// Raw frame envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn parse(text: &str) -> RealtimeResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_text(&self) -> RealtimeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Events sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Chat message for the assistant
    Message { content: String },
}

impl ClientEvent {
    pub fn to_text(&self) -> RealtimeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MessagePayload {
    content: String,
    #[serde(default)]
    metadata: Option<MessageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
struct TypingPayload {
    typing: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct NoticePayload {
    message: String,
}

/// Decoded server event
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Assistant reply
    Message {
        content: String,
        metadata: Option<MessageMetadata>,
    },
    /// Assistant typing indicator
    Typing(bool),
    /// Server-side failure; `raw` is kept as error-log details
    Error { message: String, raw: Value },
    SystemStatus(SystemStatus),
    MemoryStats(MemoryStats),
    LearningStats(LearningStats),
    EvolutionStatus(EvolutionStatus),
    ReasoningUpdate(Value),
    LearningUpdate(Value),
    EvolutionUpdate { message: String },
    /// Unrecognized event name
    Unknown(String),
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> RealtimeResult<T> {
    serde_json::from_value(data).map_err(|e| RealtimeError::Payload {
        event: event.to_string(),
        message: e.to_string(),
    })
}

impl ServerEvent {
    pub fn from_envelope(envelope: Envelope) -> RealtimeResult<Self> {
        let Envelope { event, data } = envelope;
        let decoded = match event.as_str() {
            "message" => {
                let p: MessagePayload = payload(&event, data)?;
                ServerEvent::Message {
                    content: p.content,
                    metadata: p.metadata,
                }
            }
            "typing" => ServerEvent::Typing(payload::<TypingPayload>(&event, data)?.typing),
            "error" => {
                let message = payload::<NoticePayload>(&event, data.clone())?.message;
                ServerEvent::Error { message, raw: data }
            }
            "system_status" => ServerEvent::SystemStatus(payload(&event, data)?),
            "memory_stats" => ServerEvent::MemoryStats(payload(&event, data)?),
            "learning_stats" => ServerEvent::LearningStats(payload(&event, data)?),
            "evolution_status" => ServerEvent::EvolutionStatus(payload(&event, data)?),
            "reasoning_update" => ServerEvent::ReasoningUpdate(data),
            "learning_update" => ServerEvent::LearningUpdate(data),
            "evolution_update" => ServerEvent::EvolutionUpdate {
                message: payload::<NoticePayload>(&event, data)?.message,
            },
            _ => ServerEvent::Unknown(event),
        };
        Ok(decoded)
    }

    pub fn parse(text: &str) -> RealtimeResult<Self> {
        Self::from_envelope(Envelope::parse(text)?)
    }
}

/// Apply one server event to the store
pub fn apply(event: ServerEvent, store: &AppStore, notifier: &dyn Notifier) {
    match event {
        ServerEvent::Message { content, metadata } => {
            store.add_message(Message::assistant(content, metadata));
            store.set_typing(false);
        }
        ServerEvent::Typing(typing) => store.set_typing(typing),
        ServerEvent::Error { message, raw } => {
            store.set_error(Some(message.clone()));
            store.log_error(ErrorCategory::System, message.clone(), Some(raw));
            store.set_typing(false);
            notifier.error(&message);
        }
        ServerEvent::SystemStatus(status) => store.set_system_status(status),
        ServerEvent::MemoryStats(stats) => store.set_memory_stats(stats),
        ServerEvent::LearningStats(stats) => store.set_learning_stats(stats),
        ServerEvent::EvolutionStatus(status) => store.set_evolution_status(status),
        ServerEvent::ReasoningUpdate(data) => debug!("Reasoning update: {}", data),
        ServerEvent::LearningUpdate(data) => debug!("Learning update: {}", data),
        ServerEvent::EvolutionUpdate { message } => {
            notifier.success(&format!("Evolution: {}", message));
        }
        ServerEvent::Unknown(name) => debug!("Ignoring unknown event {}", name),
    }
}

/// Decode a text frame and apply it. Malformed frames are logged and dropped.
pub fn dispatch_text(text: &str, store: &AppStore, notifier: &dyn Notifier) {
    match ServerEvent::parse(text) {
        Ok(event) => apply(event, store, notifier),
        Err(e) => warn!("Dropping realtime frame: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tantra_core::{
        BroadcastNotifier, ConnectionStatus, HealthState, NotificationLevel, Role,
    };

    fn frame(event: &str, data: Value) -> String {
        json!({ "event": event, "data": data }).to_string()
    }

    #[test]
    fn test_client_message_wire_format() {
        let text = ClientEvent::Message {
            content: "hello".into(),
        }
        .to_text()
        .unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"event": "message", "data": {"content": "hello"}}));
    }

    #[test]
    fn test_message_event_appends_assistant_reply() {
        let store = AppStore::in_memory();
        let notifier = BroadcastNotifier::default();
        store.set_typing(true);

        dispatch_text(
            &frame("message", json!({"content": "hi there", "metadata": {"confidence": 0.9}})),
            &store,
            &notifier,
        );

        let messages = store.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].content, "hi there");
        assert_eq!(messages[0].metadata.as_ref().unwrap().confidence, Some(0.9));
        assert!(!store.is_typing());
    }

    #[test]
    fn test_typing_event() {
        let store = AppStore::in_memory();
        let notifier = BroadcastNotifier::default();
        dispatch_text(&frame("typing", json!({"typing": true})), &store, &notifier);
        assert!(store.is_typing());
        dispatch_text(&frame("typing", json!({"typing": false})), &store, &notifier);
        assert!(!store.is_typing());
    }

    #[test]
    fn test_error_event_logs_and_notifies() {
        let store = AppStore::in_memory();
        let notifier = BroadcastNotifier::default();
        let mut rx = notifier.subscribe();
        store.set_typing(true);

        dispatch_text(
            &frame("error", json!({"message": "model overloaded", "code": 503})),
            &store,
            &notifier,
        );

        assert_eq!(store.error().as_deref(), Some("model overloaded"));
        let last = store.last_error().unwrap();
        assert_eq!(last.category, ErrorCategory::System);
        assert_eq!(last.details.unwrap()["code"], 503);
        assert!(!store.is_typing());

        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.level, NotificationLevel::Error);
        assert_eq!(notification.message, "model overloaded");
    }

    #[test]
    fn test_system_status_replaces_only_its_slice() {
        let store = AppStore::in_memory();
        let notifier = BroadcastNotifier::default();
        let before = store.snapshot();

        dispatch_text(
            &frame(
                "system_status",
                json!({
                    "status": "healthy",
                    "uptime": 120.0,
                    "cpu_usage": 12.5,
                    "memory_usage": 40.0,
                    "active_connections": 3,
                    "last_updated": "2024-01-01T00:00:00Z"
                }),
            ),
            &store,
            &notifier,
        );

        let after = store.snapshot();
        assert_eq!(after.system_status.as_ref().unwrap().status, HealthState::Healthy);
        assert_eq!(
            tantra_store::StoreState {
                system_status: None,
                ..after
            },
            before
        );
    }

    #[test]
    fn test_stats_events() {
        let store = AppStore::in_memory();
        let notifier = BroadcastNotifier::default();

        dispatch_text(
            &frame(
                "memory_stats",
                json!({"total_memories": 10, "recent_memories": 2, "memory_types": {"episodic": 4}, "storage_size": 2048}),
            ),
            &store,
            &notifier,
        );
        dispatch_text(
            &frame(
                "learning_stats",
                json!({"total_experiences": 5, "learning_rate": 0.1, "adaptation_score": 0.7, "knowledge_growth": 0.2}),
            ),
            &store,
            &notifier,
        );
        dispatch_text(
            &frame(
                "evolution_status",
                json!({"generation": 3, "fitness_score": 0.8, "mutations": 12, "improvements": ["faster recall"], "last_evolution": "yesterday"}),
            ),
            &store,
            &notifier,
        );

        let state = store.snapshot();
        assert_eq!(state.memory_stats.unwrap().memory_types["episodic"], 4);
        assert_eq!(state.learning_stats.unwrap().total_experiences, 5);
        assert_eq!(state.evolution_status.unwrap().generation, 3);
    }

    #[test]
    fn test_unknown_and_informational_events_leave_store_untouched() {
        let store = AppStore::in_memory();
        let notifier = BroadcastNotifier::default();
        let mut rx = notifier.subscribe();
        let before = store.snapshot();

        dispatch_text(&frame("quantum_flux", json!({"x": 1})), &store, &notifier);
        dispatch_text(&frame("reasoning_update", json!({"step": 1})), &store, &notifier);
        dispatch_text(&frame("learning_update", json!({"delta": 0.1})), &store, &notifier);
        dispatch_text(&frame("evolution_update", json!({"message": "gen 4"})), &store, &notifier);
        dispatch_text("not even json", &store, &notifier);
        dispatch_text(&frame("typing", json!({"wrong": "shape"})), &store, &notifier);

        assert_eq!(store.snapshot(), before);
        assert_eq!(store.connection_status(), ConnectionStatus::Disconnected);

        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.level, NotificationLevel::Success);
        assert_eq!(notification.message, "Evolution: gen 4");
        assert!(rx.try_recv().is_err());
    }
}
