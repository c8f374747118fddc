//! Worker health check: a bounded TCP connect to each worker's
//! coordination port.

use std::time::Duration;

use futures::future::join_all;
use loadctl_core::worker::WorkerServer;
use loadctl_events::LogBroker;
use serde::Serialize;
use tokio::net::TcpStream;

/// Point-in-time reachability of one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub server: String,
    pub reachable: bool,
    pub message: String,
}

/// Result of one health-check pass over all workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub all_healthy: bool,
    pub statuses: Vec<WorkerStatus>,
}

impl HealthReport {
    pub fn unreachable(&self) -> impl Iterator<Item = &WorkerStatus> {
        self.statuses.iter().filter(|s| !s.reachable)
    }
}

/// Try one connection to `worker` within `timeout`.
pub async fn check_worker(worker: &WorkerServer, timeout: Duration) -> WorkerStatus {
    let server = worker.to_string();
    let result =
        tokio::time::timeout(timeout, TcpStream::connect((worker.host.as_str(), worker.port)))
            .await;

    let (reachable, message) = match result {
        Ok(Ok(_stream)) => (true, "reachable".to_string()),
        Ok(Err(e)) => (false, format!("connection failed: {e}")),
        Err(_) => (
            false,
            format!("connection timed out after {}s", timeout.as_secs_f32()),
        ),
    };
    WorkerStatus {
        server,
        reachable,
        message,
    }
}

/// Check every worker once. Healthy only if all of them accept a connection.
///
/// Every worker is checked even after a failure, and each gets one run-log
/// entry. No retries.
pub async fn check_workers(
    workers: &[WorkerServer],
    timeout: Duration,
    broker: &LogBroker,
) -> HealthReport {
    let statuses = join_all(workers.iter().map(|w| check_worker(w, timeout))).await;

    for status in &statuses {
        if status.reachable {
            broker.info(format!("Worker {} is reachable", status.server));
        } else {
            broker.error(format!(
                "Worker {} is unreachable: {}",
                status.server, status.message
            ));
        }
    }

    HealthReport {
        all_healthy: !workers.is_empty() && statuses.iter().all(|s| s.reachable),
        statuses,
    }
}
