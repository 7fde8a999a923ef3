use thiserror::Error;

/// REST client errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    /// Non-success status; `message` is the body's `detail` when the server sent one
    #[error("api error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("not authenticated: {0}")]
    Unauthorized(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config error: {0}")]
    Config(String),
}

impl ApiError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }

    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Unauthorized(_) => Some(401),
            _ => None,
        }
    }

    /// Human readable message without the variant prefix
    pub fn message(&self) -> String {
        match self {
            ApiError::Api { message, .. } => message.clone(),
            ApiError::Unauthorized(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
