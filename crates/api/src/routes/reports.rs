use axum::routing::{get, post};
use axum::Router;

use crate::handlers::reports;
use crate::state::AppState;

/// Report routes mounted at `/reports`.
///
/// ```text
/// GET  /          -> list
/// POST /compare   -> compare
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(reports::list))
        .route("/compare", post(reports::compare))
}
