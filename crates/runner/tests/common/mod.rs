#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use loadctl_core::logging::{LogEntry, LogLevel};
use loadctl_core::run::StorageRoots;
use loadctl_core::transfer::TransferPolicy;
use loadctl_core::worker::WorkerServer;
use loadctl_events::{LogBroker, NotificationConfig, NotificationDispatcher, WebhookRoutes};
use loadctl_runner::clock::InstantTicker;
use loadctl_runner::{RunSupervisor, RunnerConfig, TransferSettings};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Engine that writes a valid result file and exits 0.
pub const ENGINE_OK: &str = r#"
printf 'timeStamp,elapsed,label,responseCode,success\n1,20,home,200,true\n2,25,home,200,true\n' > "$RESULT"
echo "summary = 2 in 00:00:01"
echo "WARN o.a.j.r.Sampler slow response" >&2
echo "engine finished" > "$LOG"
exit 0
"#;

/// Engine whose console output contains a Latin-1 line before more output.
pub const ENGINE_LATIN1: &str = r#"
printf 'Created the tree \351t\351\n'
sleep 1
echo "summary = 2 in 00:00:01"
echo "ERROR o.a.j.r.Sampler late failure"
printf 'timeStamp,elapsed,label,responseCode,success\n1,20,home,200,true\n2,25,home,200,true\n' > "$RESULT"
echo "engine finished" > "$LOG"
exit 0
"#;

/// Engine that exits 0 without producing a result file.
pub const ENGINE_NO_RESULT: &str = r#"
echo "engine finished" > "$LOG"
exit 0
"#;

/// Engine that fails with exit code 2.
pub const ENGINE_FAIL: &str = r#"
echo "ERROR o.a.j.JMeter: boom" > "$LOG"
echo "ERROR cannot start"
exit 2
"#;

/// Engine that runs until terminated.
pub const ENGINE_LONG: &str = r#"
exec sleep 30
"#;

/// Test workspace: storage roots, test plans and a scripted engine.
pub struct Fixture {
    pub dir: TempDir,
    pub engine: PathBuf,
    pub marker: PathBuf,
    _workers: Vec<TcpListener>,
    pub workers: Vec<WorkerServer>,
}

impl Fixture {
    /// Workspace with `healthy` listening workers and an engine running
    /// `body` after argument parsing.
    pub async fn new(body: &str, healthy: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("testplan")).unwrap();
        std::fs::write(dir.path().join("testplan/checkout.jmx"), "<jmeterTestPlan/>").unwrap();

        let marker = dir.path().join("engine-started");
        let engine = write_engine(dir.path(), &marker, body);

        let mut listeners = Vec::new();
        let mut workers = Vec::new();
        for _ in 0..healthy {
            let (listener, worker) = listening_worker().await;
            listeners.push(listener);
            workers.push(worker);
        }

        Self {
            dir,
            engine,
            marker,
            _workers: listeners,
            workers,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn storage(&self) -> StorageRoots {
        StorageRoots {
            report_dir: self.root().join("report/html"),
            result_dir: self.root().join("jtl"),
            log_dir: self.root().join("log"),
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::new(
            &self.engine,
            self.root().join("testplan"),
            self.storage(),
            self.workers.clone(),
            "http://127.0.0.1:5001",
        )
        .with_health_timeout(Duration::from_secs(1))
        .with_transfer(fast_transfer())
    }

    pub fn supervisor(&self, broker: Arc<LogBroker>) -> RunSupervisor {
        supervisor_with(self.runner_config(), broker)
    }

    pub fn engine_started(&self) -> bool {
        self.marker.exists()
    }
}

pub fn supervisor_with(config: RunnerConfig, broker: Arc<LogBroker>) -> RunSupervisor {
    let notifier =
        NotificationDispatcher::new(NotificationConfig::disabled(), Arc::clone(&broker)).unwrap();
    RunSupervisor::new(config, broker, Arc::new(notifier))
}

/// Supervisor whose notifications are enabled and sent through `routes`.
pub fn notifying_supervisor(
    config: RunnerConfig,
    broker: Arc<LogBroker>,
    routes: WebhookRoutes,
) -> RunSupervisor {
    let notifications = NotificationConfig {
        enabled: true,
        routes,
    };
    let notifier = NotificationDispatcher::new(notifications, Arc::clone(&broker)).unwrap();
    RunSupervisor::new(config, broker, Arc::new(notifier))
}

/// Small budgets and no real waiting.
pub fn fast_transfer() -> TransferSettings {
    TransferSettings {
        policy: TransferPolicy {
            max_attempts: 3,
            ..TransferPolicy::default()
        },
        ticker: Arc::new(InstantTicker),
    }
}

pub fn debug_broker() -> Arc<LogBroker> {
    Arc::new(LogBroker::with_threshold(LogLevel::Debug))
}

/// Write an executable shell script that records `-l`/`-j` as `$RESULT`
/// and `$LOG`, touches `marker`, then runs `body`.
pub fn write_engine(dir: &Path, marker: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-engine.sh");
    let script = format!(
        r#"#!/bin/sh
touch "{marker}"
while [ $# -gt 0 ]; do
  case "$1" in
    -l) RESULT="$2"; shift 2 ;;
    -j) LOG="$2"; shift 2 ;;
    *) shift ;;
  esac
done
{body}
"#,
        marker = marker.display()
    );
    std::fs::write(&path, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

pub async fn listening_worker() -> (TcpListener, WorkerServer) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, WorkerServer::with_port("127.0.0.1", port))
}

pub async fn closed_worker() -> WorkerServer {
    let (listener, worker) = listening_worker().await;
    drop(listener);
    worker
}

/// Everything published so far.
pub fn drain(rx: &mut broadcast::Receiver<LogEntry>) -> Vec<LogEntry> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

pub fn messages(entries: &[LogEntry]) -> Vec<String> {
    entries.iter().map(|e| e.message.clone()).collect()
}
