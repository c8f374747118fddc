use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use loadctl_core::reports::{mime_for, resolve_report_path, ReportPathError};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /report/html/{*path}
///
/// Serve a file from the report root. Paths that could escape the root are
/// refused with 403 before touching the filesystem; a directory serves its
/// `index.html`.
pub async fn serve_report_file(
    State(state): State<AppState>,
    Path(requested): Path<String>,
) -> AppResult<impl IntoResponse> {
    let root = state.config.report_dir.clone();
    let lookup = requested.clone();
    let full = tokio::task::spawn_blocking(move || resolve_report_path(&root, &lookup))
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .inspect_err(|e| {
            if matches!(e, ReportPathError::Traversal) {
                tracing::warn!(path = %requested, "Rejected report path");
            }
        })?;

    let body = tokio::fs::read(&full).await.map_err(|e| {
        AppError::InternalError(format!("Failed to read {}: {e}", full.display()))
    })?;

    Ok(([(CONTENT_TYPE, mime_for(&full))], body))
}
