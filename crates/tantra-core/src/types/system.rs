//! Snapshots of backend state, pushed over the realtime channel or fetched
//! over REST.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Warning,
    Error,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentHealth {
    Healthy,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentsHealth {
    pub memory: ComponentHealth,
    pub reasoning: ComponentHealth,
    pub learning: ComponentHealth,
    pub evolution: ComponentHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: HealthState,
    pub uptime: f64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub active_connections: u64,
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentsHealth>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_memories: u64,
    pub recent_memories: u64,
    #[serde(default)]
    pub memory_types: HashMap<String, u64>,
    pub storage_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_importance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStats {
    pub total_experiences: u64,
    pub learning_rate: f64,
    pub adaptation_score: f64,
    pub knowledge_growth: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub recent_improvements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionStatus {
    pub generation: u64,
    pub fitness_score: f64,
    pub mutations: u64,
    #[serde(default)]
    pub improvements: Vec<String>,
    pub last_evolution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_evolution_eta: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub response_time: f64,
    pub throughput: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub network_io: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMetrics {
    pub reasoning_accuracy: f64,
    pub learning_efficiency: f64,
    pub memory_utilization: f64,
    pub evolution_progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub performance: PerformanceMetrics,
    pub resources: ResourceMetrics,
    pub ai_metrics: AiMetrics,
}
