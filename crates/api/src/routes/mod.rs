pub mod health;
pub mod logs;
pub mod reports;
pub mod runs;
pub mod static_reports;
pub mod test_plans;
pub mod workers;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /runs                          start a run (POST)
/// /runs/current                  active run and last outcome (GET)
/// /runs/current/stop             stop the active run (POST)
///
/// /test-plans                    available test plans (GET)
///
/// /reports                       stored reports, newest first (GET)
/// /reports/compare               diff two reports (POST)
///
/// /logs/stream                   run log as server-sent events (GET)
///
/// /workers/health                check worker servers (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/runs", runs::router())
        .nest("/test-plans", test_plans::router())
        .nest("/reports", reports::router())
        .nest("/logs", logs::router())
        .nest("/workers", workers::router())
}
