//! Memory, reasoning, learning, evolution and system endpoints under `/api/v1`

use tantra_core::{EvolutionStatus, LearningStats, MemoryStats, SystemMetrics, SystemStatus};

use crate::client::{ApiClient, RequestSpec};
use crate::error::ApiResult;
use crate::types::{
    LearningRequest, MemoryRequest, MemoryResponse, OperationResult, ReasoningRequest,
    ReasoningResponse,
};

impl ApiClient {
    pub async fn store_memory(&self, request: &MemoryRequest) -> ApiResult<MemoryResponse> {
        self.call(RequestSpec::post("/api/v1/memory/store").json(request)?)
            .await
    }

    pub async fn retrieve_memories(&self, query: &str, limit: u32) -> ApiResult<Vec<MemoryResponse>> {
        self.call(
            RequestSpec::get("/api/v1/memory/retrieve")
                .query("query", query)
                .query("limit", limit),
        )
        .await
    }

    pub async fn memory_stats(&self) -> ApiResult<MemoryStats> {
        self.call(RequestSpec::get("/api/v1/memory/stats")).await
    }

    pub async fn analyze_reasoning(&self, request: &ReasoningRequest) -> ApiResult<ReasoningResponse> {
        self.call(RequestSpec::post("/api/v1/reasoning/analyze").json(request)?)
            .await
    }

    pub async fn add_learning_experience(&self, request: &LearningRequest) -> ApiResult<OperationResult> {
        self.call(RequestSpec::post("/api/v1/learning/experience").json(request)?)
            .await
    }

    pub async fn learning_stats(&self) -> ApiResult<LearningStats> {
        self.call(RequestSpec::get("/api/v1/learning/stats")).await
    }

    pub async fn evolution_status(&self) -> ApiResult<EvolutionStatus> {
        self.call(RequestSpec::get("/api/v1/evolution/status")).await
    }

    pub async fn trigger_evolution(&self) -> ApiResult<OperationResult> {
        self.call(RequestSpec::post("/api/v1/evolution/trigger")).await
    }

    pub async fn system_status(&self) -> ApiResult<SystemStatus> {
        self.call(RequestSpec::get("/api/v1/system/status")).await
    }

    pub async fn system_metrics(&self) -> ApiResult<SystemMetrics> {
        self.call(RequestSpec::get("/api/v1/system/metrics")).await
    }
}
