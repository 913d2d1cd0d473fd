//! Learning and retrieval maintenance endpoints.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;
use vecta_core::{LearningReport, RagStats};

use super::blocking;
use crate::error::ApiResult;
use crate::state::AppState;

/// Improvement metrics and few-shot library counts.
pub async fn metrics(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let core = state.core();
    let (metrics, library) = blocking(move || {
        Ok((core.improvement_metrics()?, core.library_statistics()?))
    })
    .await?;

    Ok(Json(json!({
        "status": "success",
        "metrics": metrics,
        "library": library,
    })))
}

/// Run a learning cycle now.
pub async fn run(State(state): State<AppState>) -> ApiResult<Json<LearningReport>> {
    let core = state.core();
    let report = blocking(move || Ok(core.run_learning_cycle()?)).await?;
    info!(
        examples_added = report.examples_added,
        cases = report.cases_processed,
        "Manual learning cycle completed"
    );
    Ok(Json(report))
}

pub async fn rag_stats(State(state): State<AppState>) -> ApiResult<Json<RagStats>> {
    Ok(Json(state.core().rag_stats()?))
}

/// Rebuild the guideline index from disk.
pub async fn reindex(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let core = state.core();
    let chunks = blocking(move || Ok(core.reindex_rag()?)).await?;
    info!(chunks, "Guideline index rebuilt");
    Ok(Json(json!({
        "status": "success",
        "total_chunks": chunks,
    })))
}
