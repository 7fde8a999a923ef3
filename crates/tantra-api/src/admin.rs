//! Operator endpoints: `/admin/*` and `/developer/*`

use serde_json::{json, Value};

use crate::client::{ApiClient, RequestSpec};
use crate::error::{ApiError, ApiResult};
use crate::types::OperationResult;

impl ApiClient {
    // ========== Admin ==========

    pub async fn admin_dashboard(&self) -> ApiResult<Value> {
        self.call(RequestSpec::get("/admin/dashboard")).await
    }

    pub async fn system_health(&self) -> ApiResult<Value> {
        self.call(RequestSpec::get("/admin/system/health")).await
    }

    pub async fn system_logs(&self, level: Option<&str>, limit: Option<u32>) -> ApiResult<Vec<Value>> {
        self.call(
            RequestSpec::get("/admin/system/logs")
                .query_opt("level", level)
                .query_opt("limit", limit),
        )
        .await
    }

    pub async fn configuration(&self) -> ApiResult<Value> {
        self.call(RequestSpec::get("/admin/config")).await
    }

    pub async fn update_configuration(&self, config: &Value) -> ApiResult<OperationResult> {
        self.call(RequestSpec::put("/admin/config").json(config)?)
            .await
    }

    pub async fn restart_system(&self) -> ApiResult<OperationResult> {
        self.call(RequestSpec::post("/admin/system/restart")).await
    }

    pub async fn user_activity(&self) -> ApiResult<Vec<Value>> {
        self.call(RequestSpec::get("/admin/users/activity")).await
    }

    pub async fn performance_metrics(&self) -> ApiResult<Value> {
        self.call(RequestSpec::get("/admin/performance/metrics")).await
    }

    // ========== Developer ==========

    pub async fn developer_dashboard(&self) -> ApiResult<Value> {
        self.call(RequestSpec::get("/developer/dashboard")).await
    }

    pub async fn developer_metrics(
        &self,
        component: Option<&str>,
        category: Option<&str>,
    ) -> ApiResult<Vec<Value>> {
        self.call(
            RequestSpec::get("/developer/metrics")
                .query_opt("component", component)
                .query_opt("category", category),
        )
        .await
    }

    /// `GET /developer/debug/{component}`
    pub async fn debug_info(&self, component: &str) -> ApiResult<Value> {
        let valid = !component.is_empty()
            && component
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ApiError::InvalidRequest(format!(
                "invalid component name: {:?}",
                component
            )));
        }
        self.call(RequestSpec::get(format!("/developer/debug/{}", component)))
            .await
    }

    pub async fn system_traces(&self, limit: Option<u32>) -> ApiResult<Vec<Value>> {
        self.call(RequestSpec::get("/developer/traces").query_opt("limit", limit))
            .await
    }

    pub async fn trigger_debug_operation(&self, operation: &str) -> ApiResult<OperationResult> {
        self.call(RequestSpec::post("/developer/debug/trigger").json(&json!({ "operation": operation }))?)
            .await
    }
}
