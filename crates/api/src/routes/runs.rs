use axum::routing::{get, post};
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;

/// Run lifecycle routes mounted at `/runs`.
///
/// ```text
/// POST /                 -> start_run
/// GET  /current          -> current_run
/// POST /current/stop     -> stop_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(runs::start_run))
        .route("/current", get(runs::current_run))
        .route("/current/stop", post(runs::stop_run))
}
