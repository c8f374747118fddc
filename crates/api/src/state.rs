use std::sync::Arc;

use loadctl_events::LogBroker;
use loadctl_runner::compare::ReportComparer;
use loadctl_runner::RunSupervisor;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Owner of the single active-run slot.
    pub supervisor: RunSupervisor,
    /// Run-log fan-out feeding the SSE stream.
    pub broker: Arc<LogBroker>,
    /// Report comparison backend; `None` when `COMPARE_COMMAND` is unset.
    pub comparer: Option<Arc<dyn ReportComparer>>,
}
