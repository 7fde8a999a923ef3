//! Tantra API - authenticated REST client
//!
//! One [`ApiClient`] per process. Clones share the HTTP connection pool, the
//! credential and the session event channel.

mod admin;
mod auth;
mod chat;
pub mod client;
pub mod error;
mod insights;
pub mod types;

pub use client::{ApiClient, ApiClientBuilder, SessionEvent, DEFAULT_AUTH_REDIRECT, DEFAULT_TIMEOUT};
pub use error::{ApiError, ApiResult};
pub use types::{
    AuthResponse, ChatRequest, ChatResponse, LearningOutcome, LearningRequest, LoginRequest,
    MemoryRequest, MemoryResponse, MemoryType, OperationResult, ReasoningRequest,
    ReasoningResponse, ReasoningType, RegisterRequest,
};
