use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use loadctl_core::test_plans::list_test_plans;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/test-plans
///
/// Names of the available test plans, sorted. A missing plan directory
/// yields an empty list.
pub async fn list_plans(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let dir = state.config.test_plan_dir.clone();
    let plans = tokio::task::spawn_blocking(move || list_test_plans(&dir))
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .map_err(|e| AppError::InternalError(format!("Failed to list test plans: {e}")))?;

    Ok(Json(DataResponse { data: plans }))
}
