use axum::routing::get;
use axum::Router;

use crate::handlers::workers;
use crate::state::AppState;

/// Worker routes mounted at `/workers`.
///
/// ```text
/// GET  /health   -> workers_health
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(workers::workers_health))
}
