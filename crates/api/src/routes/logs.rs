use axum::routing::get;
use axum::Router;

use crate::handlers::logs;
use crate::state::AppState;

/// Run-log routes mounted at `/logs`.
///
/// ```text
/// GET  /stream   -> stream_logs (text/event-stream)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/stream", get(logs::stream_logs))
}
