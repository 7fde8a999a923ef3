//! `/chat/*`

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::client::{ApiClient, RequestSpec};
use crate::error::ApiResult;
use crate::types::{ChatRequest, ChatResponse, OperationResult};

impl ApiClient {
    /// `POST /chat/message`
    pub async fn send_message(
        &self,
        message: &str,
        context: Option<HashMap<String, Value>>,
        session_id: Option<&str>,
    ) -> ApiResult<ChatResponse> {
        let request = ChatRequest {
            message: message.to_string(),
            context,
            session_id: session_id.map(str::to_string),
        };
        self.call(RequestSpec::post("/chat/message").json(&request)?)
            .await
    }

    /// `GET /chat/history`
    pub async fn chat_history(&self, session_id: Option<&str>) -> ApiResult<Vec<Value>> {
        self.call(RequestSpec::get("/chat/history").query_opt("session_id", session_id))
            .await
    }

    /// `GET /chat/sessions`
    pub async fn chat_sessions(&self) -> ApiResult<Vec<Value>> {
        self.call(RequestSpec::get("/chat/sessions")).await
    }

    /// `DELETE /chat/history`, for one session or all of them
    pub async fn clear_chat_history(&self, session_id: Option<&str>) -> ApiResult<OperationResult> {
        let body = match session_id {
            Some(id) => json!({ "session_id": id }),
            None => json!({}),
        };
        self.call(RequestSpec::delete("/chat/history").json(&body)?)
            .await
    }
}
