use axum::routing::get;
use axum::Router;

use crate::handlers::test_plans;
use crate::state::AppState;

/// Test plan routes mounted at `/test-plans`.
///
/// ```text
/// GET  /   -> list_plans
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(test_plans::list_plans))
}
