use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::store::StoreStats;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: f64,
    pub running_tasks: usize,
    pub total_tasks_handled: usize,
    pub execution_stats: ExecutionStats,
}

#[derive(Serialize)]
pub struct ExecutionStats {
    pub success: usize,
    pub error: usize,
    pub running: usize,
}

impl From<StoreStats> for ExecutionStats {
    fn from(stats: StoreStats) -> Self {
        Self {
            success: stats.success,
            error: stats.error,
            running: stats.running,
        }
    }
}

/// GET / — Service identification.
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "name": env!("CARGO_PKG_NAME") }))
}

/// GET /health — liveness plus job counts from the store.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.store.stats();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs_f64(),
        running_tasks: stats.running,
        total_tasks_handled: stats.total,
        execution_stats: stats.into(),
    })
}
