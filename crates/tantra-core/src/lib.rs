//! Tantra Core - domain model for the console client
//!
//! Shared types used by the store, the REST client, the realtime channel
//! and the auth context.

pub mod notify;
pub mod types;

pub use notify::{BroadcastNotifier, Notification, NotificationLevel, Notifier, TracingNotifier};
pub use types::{
    ChatSession, ComponentHealth, ComponentsHealth, ConnectionStatus, DeliveryState,
    ErrorCategory, ErrorLogEntry, EvolutionStatus, HealthState, LearningStats, MemoryStats,
    Message, MessageId, MessageMetadata, Role, SystemMetrics, SystemStatus, User, UserRole,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
