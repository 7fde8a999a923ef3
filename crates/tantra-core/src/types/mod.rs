pub mod error_log;
pub mod message;
pub mod session;
pub mod system;
pub mod user;

pub use error_log::{ErrorCategory, ErrorLogEntry};
pub use message::{DeliveryState, Message, MessageId, MessageMetadata, Role};
pub use session::{ChatSession, ConnectionStatus};
pub use system::{
    ComponentHealth, ComponentsHealth, EvolutionStatus, HealthState, LearningStats, MemoryStats,
    SystemMetrics, SystemStatus,
};
pub use user::{User, UserRole};
