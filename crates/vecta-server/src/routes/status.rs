use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use vecta_llm::HealthReport;

use crate::state::AppState;

pub const SERVICE_VERSION: &str = "2.0-enhanced-prompting";

/// Liveness check.
pub async fn test() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Vecta AI service is running",
        "timestamp": chrono::Local::now().to_rfc3339(),
        "version": SERVICE_VERSION,
        "prompt_engine": "Vecta-AI-Optimized",
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.service.health().await)
}
