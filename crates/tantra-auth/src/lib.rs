//! Tantra Auth - session bootstrap and access control
//!
//! [`AuthContext`] resolves the stored credential at startup and tracks the
//! signed-in user; [`AccessGuard`] turns that state into a view decision.

pub mod context;
pub mod error;
pub mod guard;

pub use context::{AuthContext, AuthState};
pub use error::{AuthError, AuthResult};
pub use guard::{AccessGuard, GuardDecision, Requirement};
