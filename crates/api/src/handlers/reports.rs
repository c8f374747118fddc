//! Handlers for stored reports: listing and comparison.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use loadctl_core::reports::list_reports;
use loadctl_runner::compare::{compare_reports, CompareError};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/reports
///
/// Every report directory that has an entry page, newest first.
pub async fn list(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let root = state.config.report_dir.clone();
    let reports = tokio::task::spawn_blocking(move || list_reports(&root))
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .map_err(|e| AppError::InternalError(format!("Failed to list reports: {e}")))?;

    Ok(Json(DataResponse { data: reports }))
}

// ---------------------------------------------------------------------------
// Compare
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/reports/compare`: two report links as returned by
/// the list endpoint.
#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub report1_path: String,
    pub report2_path: String,
}

/// POST /api/v1/reports/compare
///
/// Diff the statistics of two reports. Returns the result-page redirect.
pub async fn compare(
    State(state): State<AppState>,
    Json(input): Json<CompareRequest>,
) -> AppResult<impl IntoResponse> {
    if input.report1_path.trim().is_empty() || input.report2_path.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Both report1_path and report2_path are required".into(),
        ));
    }
    let comparer = state.comparer.as_deref().ok_or(CompareError::Unavailable)?;

    let result = compare_reports(
        comparer,
        &state.config.report_dir,
        &state.config.compare_output_dir,
        &input.report1_path,
        &input.report2_path,
    )
    .await?;

    Ok(Json(DataResponse { data: result }))
}
