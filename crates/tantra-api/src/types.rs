//! Request and response bodies
//!
//! Admin and developer endpoints return loosely shaped JSON and are exposed as
//! [`serde_json::Value`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tantra_core::{MessageMetadata, User, UserRole};

// ========== Auth ==========

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

// ========== Chat ==========

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
}

/// `{ success, message }` acknowledgement used by mutating endpoints
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OperationResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

// ========== Memory ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Episodic,
    Semantic,
    Procedural,
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "episodic" => Ok(MemoryType::Episodic),
            "semantic" => Ok(MemoryType::Semantic),
            "procedural" => Ok(MemoryType::Procedural),
            other => Err(format!("Unknown memory type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryRequest {
    pub content: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub importance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryResponse {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub memory_type: String,
    pub importance: f64,
    pub timestamp: String,
    #[serde(default)]
    pub context: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub similarity_score: Option<f64>,
}

// ========== Reasoning ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningType {
    Deductive,
    Inductive,
    Abductive,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasoningRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_type: Option<ReasoningType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReasoningResponse {
    pub reasoning_chain: Vec<String>,
    pub conclusion: String,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

// ========== Learning ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningOutcome {
    Success,
    Failure,
    Neutral,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningRequest {
    pub experience: String,
    pub outcome: LearningOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_omits_missing_role() {
        let req = RegisterRequest {
            username: "ana".into(),
            email: "ana@example.com".into(),
            password: "pw".into(),
            role: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("role").is_none());

        let req = RegisterRequest {
            role: Some(UserRole::Developer),
            ..req
        };
        assert_eq!(serde_json::to_value(&req).unwrap()["role"], "developer");
    }

    #[test]
    fn test_memory_request_uses_type_field() {
        let req = MemoryRequest {
            content: "fact".into(),
            memory_type: MemoryType::Semantic,
            importance: 0.8,
            context: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "semantic");
        assert!(json.get("context").is_none());
    }

    #[test]
    fn test_chat_response_without_metadata() {
        let resp: ChatResponse = serde_json::from_str(r#"{"response":"hi"}"#).unwrap();
        assert_eq!(resp.response, "hi");
        assert!(resp.session_id.is_none());
        assert!(resp.metadata.is_none());
    }
}
