//! HTTP error type with JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use vecta_core::db::DbError;
use vecta_core::CoreError;
use vecta_llm::AnalysisError;

/// Error body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unavailable: {0}")]
    Unavailable(String),
    /// Model call failed; the message is shown to the caller.
    #[error("{0}")]
    AnalysisFailed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, detail),
            ApiError::Unavailable(detail) => (StatusCode::SERVICE_UNAVAILABLE, detail),
            ApiError::AnalysisFailed(detail) => {
                tracing::error!(detail, "Analysis failed");
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(DbError::NotFound(what)) => ApiError::NotFound(what),
            CoreError::Database(DbError::Conflict(what)) => ApiError::Conflict(what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Gate(e) => ApiError::Unavailable(e.to_string()),
            AnalysisError::EmptyText => ApiError::BadRequest(AnalysisError::EmptyText.to_string()),
            AnalysisError::Generation(e) => {
                ApiError::AnalysisFailed(format!("Vecta AI analysis failed: {e}"))
            }
            AnalysisError::Context(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("background task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use vecta_llm::{GateError, GenerationError};

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_bad_request_returns_400() {
        let response = ApiError::BadRequest("Prompt is required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Prompt is required");
    }

    #[tokio::test]
    async fn test_internal_hides_detail() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_capacity_maps_to_503() {
        let api: ApiError = AnalysisError::Gate(GateError::AtCapacity).into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Vecta AI service at capacity. Try again later.");
    }

    #[tokio::test]
    async fn test_generation_failure_message() {
        let api: ApiError = AnalysisError::Generation(GenerationError::Timeout(300)).into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("Vecta AI analysis failed:"));
    }

    #[test]
    fn test_missing_output_maps_to_not_found() {
        let api: ApiError = CoreError::Database(DbError::NotFound("output 42".into())).into();
        assert!(matches!(api, ApiError::NotFound(ref s) if s == "output 42"));

        let api: ApiError = CoreError::Database(DbError::Conflict("email taken".into())).into();
        assert!(matches!(api, ApiError::Conflict(_)));

        let api: ApiError = CoreError::LockPoisoned("db".into()).into();
        assert!(matches!(api, ApiError::Internal(_)));
    }
}
