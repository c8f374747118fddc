use axum::routing::get;
use axum::Router;

use crate::handlers::static_reports;
use crate::state::AppState;

/// Generated HTML reports, mounted at the root (not under `/api/v1`) so the
/// links in notifications and the report list resolve as-is.
pub fn router() -> Router<AppState> {
    Router::new().route("/report/html/{*path}", get(static_reports::serve_report_file))
}
