//! # Auth Error Types
//!
//! 登录、注册与会话引导相关的错误类型。

use tantra_api::ApiError;
use thiserror::Error;

/// 认证错误类型
#[derive(Error, Debug)]
pub enum AuthError {
    /// 服务端拒绝（凭据错误、用户名已存在等），`message` 面向用户展示
    #[error("{message}")]
    Rejected {
        status: Option<u16>,
        message: String,
        #[source]
        source: ApiError,
    },

    /// 当前没有登录用户
    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    /// Wrap an API failure, falling back to `fallback` when the server sent no usable text
    pub(crate) fn rejected(source: ApiError, fallback: &str) -> Self {
        let status = source.status();
        let message = match status {
            Some(_) => {
                let message = source.message();
                if message.trim().is_empty() {
                    fallback.to_string()
                } else {
                    message
                }
            }
            None => fallback.to_string(),
        };
        AuthError::Rejected {
            status,
            message,
            source,
        }
    }

    /// HTTP status of the rejection, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Rejected { status, .. } => *status,
            AuthError::NotAuthenticated => None,
        }
    }
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_prefers_server_message() {
        let err = AuthError::rejected(
            ApiError::Api {
                status: 400,
                message: "Username already registered".into(),
            },
            "Registration failed",
        );
        assert_eq!(err.to_string(), "Username already registered");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_rejected_falls_back_without_response() {
        let err = AuthError::rejected(ApiError::Network("connection refused".into()), "Login failed");
        assert_eq!(err.to_string(), "Login failed");
        assert_eq!(err.status(), None);
    }
}
