//! Handlers for the load-test run lifecycle.
//!
//! At most one run is active at a time; the [`RunSupervisor`] owns that
//! slot and these handlers only translate HTTP to supervisor calls.
//!
//! [`RunSupervisor`]: loadctl_runner::RunSupervisor

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Users requested when the body omits them.
const DEFAULT_USERS: u32 = 100;
/// Duration in seconds when the body omits it.
const DEFAULT_DURATION_SECS: u32 = 30;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/runs`.
///
/// The `jmx_file`, `thread_num` and `test_duration` aliases keep the form
/// field names of the existing web page working.
#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    #[serde(alias = "jmx_file")]
    pub test_plan: String,
    #[serde(alias = "thread_num", default = "default_users")]
    pub users: u32,
    #[serde(alias = "test_duration", default = "default_duration")]
    pub duration_secs: u32,
    #[serde(default)]
    pub step_num: Option<u32>,
}

fn default_users() -> u32 {
    DEFAULT_USERS
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_SECS
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// POST /api/v1/runs
///
/// Start a distributed run. Returns 201 with the run snapshot once the
/// engine has been spawned; the run continues in the background.
pub async fn start_run(
    State(state): State<AppState>,
    Json(input): Json<StartRunRequest>,
) -> AppResult<impl IntoResponse> {
    let config = state.supervisor.run_config(
        input.test_plan,
        input.users,
        input.duration_secs,
        input.step_num,
    );
    let started = state.supervisor.start(config).await?;

    tracing::info!(
        run_id = %started.snapshot.run_id,
        test_name = %started.snapshot.test_name,
        actual_users = started.snapshot.actual_users,
        "Run started",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: started.snapshot,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/runs/current
///
/// Whether a run is active, its snapshot, and the last finished outcome.
pub async fn current_run(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let status = state.supervisor.status().await;
    Ok(Json(DataResponse { data: status }))
}

// ---------------------------------------------------------------------------
// Stop
// ---------------------------------------------------------------------------

/// POST /api/v1/runs/current/stop
///
/// Signal the active run's engine to terminate. Returns the snapshot of the
/// run being stopped; 409 when there is nothing to stop.
pub async fn stop_run(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let snapshot = state.supervisor.stop().await?;

    tracing::info!(run_id = %snapshot.run_id, "Run stop requested");

    Ok(Json(DataResponse { data: snapshot }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_field_names_are_accepted() {
        let body = r#"{"jmx_file": "checkout", "thread_num": 50, "test_duration": 120}"#;
        let req: StartRunRequest = serde_json::from_str(body).unwrap();

        assert_eq!(req.test_plan, "checkout");
        assert_eq!(req.users, 50);
        assert_eq!(req.duration_secs, 120);
        assert_eq!(req.step_num, None);
    }

    #[test]
    fn omitted_users_and_duration_use_defaults() {
        let req: StartRunRequest =
            serde_json::from_str(r#"{"test_plan": "checkout", "step_num": 5}"#).unwrap();

        assert_eq!(req.users, DEFAULT_USERS);
        assert_eq!(req.duration_secs, DEFAULT_DURATION_SECS);
        assert_eq!(req.step_num, Some(5));
    }
}
