use thiserror::Error;

/// Realtime channel errors
///
/// These never reach the presentation layer: the channel turns them into
/// error-log entries and notifications.
#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("handshake error: {0}")]
    Handshake(String),

    #[error("invalid frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("invalid {event} payload: {message}")]
    Payload { event: String, message: String },
}

pub type RealtimeResult<T> = std::result::Result<T, RealtimeError>;
