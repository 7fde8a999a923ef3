//! Tantra Realtime - live event channel
//!
//! Maintains one socket to the backend, turns inbound events into store
//! mutations and offers an optimistic send path with HTTP fallback.

pub mod channel;
pub mod error;
pub mod policy;
pub mod protocol;

pub use channel::{RealtimeChannel, SendOutcome};
pub use error::{RealtimeError, RealtimeResult};
pub use policy::ReconnectionPolicy;
pub use protocol::{apply, dispatch_text, ClientEvent, Envelope, ServerEvent};
