use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use loadctl_runner::health::HealthReport;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

/// One worker in the health response.
#[derive(Debug, Serialize)]
pub struct ServerHealth {
    pub server: String,
    /// `online` or `offline`.
    pub status: &'static str,
    pub message: String,
}

/// Response of `GET /api/v1/workers/health`.
#[derive(Debug, Serialize)]
pub struct WorkersHealthResponse {
    pub success: bool,
    pub servers: Vec<ServerHealth>,
    pub message: String,
}

impl From<HealthReport> for WorkersHealthResponse {
    fn from(report: HealthReport) -> Self {
        let message = if report.all_healthy {
            "All worker servers are reachable".to_string()
        } else {
            let down: Vec<&str> = report.unreachable().map(|s| s.server.as_str()).collect();
            if down.is_empty() {
                "No worker servers configured".to_string()
            } else {
                format!("Unreachable worker servers: {}", down.join(", "))
            }
        };
        let servers = report
            .statuses
            .into_iter()
            .map(|s| ServerHealth {
                server: s.server,
                status: if s.reachable { "online" } else { "offline" },
                message: s.message,
            })
            .collect();

        Self {
            success: report.all_healthy,
            servers,
            message,
        }
    }
}

/// GET /api/v1/workers/health
///
/// Check every configured worker now. Always 200; `success` says whether
/// all of them answered.
pub async fn workers_health(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let report = state.supervisor.check_workers().await;
    Ok(Json(WorkersHealthResponse::from(report)))
}
