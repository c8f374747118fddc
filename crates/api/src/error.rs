use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loadctl_core::reports::ReportPathError;
use loadctl_runner::compare::CompareError;
use loadctl_runner::{LaunchRejected, StopError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the runner and report errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A run could not be started.
    #[error(transparent)]
    Launch(#[from] LaunchRejected),

    /// A stop request found nothing to stop.
    #[error(transparent)]
    Stop(#[from] StopError),

    /// A report path was rejected or missing.
    #[error(transparent)]
    ReportPath(#[from] ReportPathError),

    /// A report comparison failed.
    #[error(transparent)]
    Compare(#[from] CompareError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- Run lifecycle ---
            AppError::Launch(err) => classify_launch_error(err),
            AppError::Stop(err) => (StatusCode::CONFLICT, "CONFLICT", err.to_string()),

            // --- Reports ---
            AppError::ReportPath(err) => match err {
                ReportPathError::Traversal => {
                    (StatusCode::FORBIDDEN, "FORBIDDEN", err.to_string())
                }
                ReportPathError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
            },
            AppError::Compare(err) => classify_compare_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal("Internal error", msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a rejected launch into an HTTP status, error code, and message.
///
/// - Bad parameters map to 400, a missing test plan to 404.
/// - An active run maps to 409.
/// - Unreachable workers map to 503.
/// - Storage and spawn failures map to 500 with a sanitized message.
fn classify_launch_error(err: &LaunchRejected) -> (StatusCode, &'static str, String) {
    match err {
        LaunchRejected::InvalidConfig(_) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
        }
        LaunchRejected::AlreadyActive => (StatusCode::CONFLICT, "RUN_ACTIVE", err.to_string()),
        LaunchRejected::MissingTestPlan(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        LaunchRejected::WorkersUnreachable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "WORKERS_UNREACHABLE",
            err.to_string(),
        ),
        LaunchRejected::Storage(_) | LaunchRejected::Spawn(_) => {
            internal("Run launch failed", &err.to_string())
        }
    }
}

fn classify_compare_error(err: &CompareError) -> (StatusCode, &'static str, String) {
    match err {
        CompareError::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            "COMPARE_UNAVAILABLE",
            err.to_string(),
        ),
        CompareError::Path(ReportPathError::Traversal) => {
            (StatusCode::FORBIDDEN, "FORBIDDEN", err.to_string())
        }
        CompareError::Path(ReportPathError::NotFound(_)) | CompareError::MissingStatistics(_) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
        }
        CompareError::Io(_) | CompareError::Failed { .. } => {
            internal("Report comparison failed", &err.to_string())
        }
    }
}

fn internal(context: &'static str, msg: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %msg, "{context}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
