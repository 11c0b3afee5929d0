use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use storyreel_core::error::CoreError;
use storyreel_pipeline::PipelineError;

/// Message returned in place of any internal failure detail.
const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Message returned when the prompt structuring service fails.
const UPSTREAM_MESSAGE: &str = "The prompt structuring service is unavailable";

/// Error type returned by every story handler.
///
/// Domain failures arrive as [`CoreError`]; pipeline failures are folded in
/// through `From<PipelineError>`. Rendered as `{ "error": ..., "code": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Malformed path or query input.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Prompt structuring failed or was unreachable.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Core(core) => AppError::Core(core),
            // The model answered but its output was unusable.
            PipelineError::Structuring(e) if e.is_bad_output() => {
                AppError::Core(CoreError::Validation(e.to_string()))
            }
            PipelineError::Structuring(e) => AppError::Upstream(e.to_string()),
            other @ (PipelineError::Render(_) | PipelineError::Persistence(_)) => {
                AppError::InternalError(other.to_string())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl AppError {
    /// Status, stable error code, and client-facing message. Details of
    /// upstream and internal failures are logged here and never returned.
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(CoreError::NotFound { entity, id }) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} with id {id} not found"),
            ),
            AppError::Core(CoreError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Core(CoreError::Conflict(msg)) => {
                (StatusCode::CONFLICT, "CONFLICT", msg.clone())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Upstream(detail) => {
                tracing::error!(error = %detail, "Prompt structuring failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    UPSTREAM_MESSAGE.to_string(),
                )
            }
            AppError::Core(CoreError::Internal(detail)) | AppError::InternalError(detail) => {
                tracing::error!(error = %detail, "Request failed internally");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error) = self.classify();
        (status, Json(ErrorBody { error, code })).into_response()
    }
}
