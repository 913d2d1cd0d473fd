//! HTTP routes.

mod analyze;
mod learning;
mod status;
mod validation;

pub use analyze::AnalyzeForm;
pub use validation::SubmitValidation;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let max_body = state.config.max_upload_bytes;

    Router::new()
        .route("/test", get(status::test))
        .route("/health", get(status::health))
        .route("/analyze", post(analyze::analyze))
        .nest("/validate", validation::router())
        .route("/learning/metrics", get(learning::metrics))
        .route("/learning/run", post(learning::run))
        .route("/rag/stats", get(learning::rag_stats))
        .route("/rag/reindex", post(learning::reindex))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run a blocking store call off the async runtime.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(ApiError::from)?
}
