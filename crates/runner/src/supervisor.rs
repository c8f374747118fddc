//! Run supervisor and the single active-run slot.
//!
//! [`RunSupervisor::start`] reserves the slot, checks the test plan and the
//! workers, spawns the engine and hands the run to a supervising task. That
//! task relays output, waits for the engine, monitors the result transfer,
//! sends the outcome notification and finally clears the slot. Start, stop
//! and status all go through the same `RwLock`, so at most one run is ever
//! active.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use loadctl_core::notification::{NotificationMessage, RunOutcomeKind};
use loadctl_core::run::{
    distribute_users, report_list_url, report_url, test_plan_path, RunConfig, RunIdentity,
    RunPaths, RunPhase, RunSnapshot,
};
use loadctl_core::types::{Timestamp, DISPLAY_TIME_FORMAT};
use loadctl_events::{LogBroker, NotificationDispatcher};
use serde::Serialize;
use tokio::process::Child;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::diagnostics;
use crate::engine::EngineInvocation;
use crate::health::{self, HealthReport};
use crate::journal::TransferJournal;
use crate::relay::relay_output;
use crate::transfer::{FsResultSource, ResultTransferMonitor, TransferReport};

/// Grace period between SIGTERM and a hard kill.
const TERMINATE_GRACE: Duration = Duration::from_secs(10);

/// How long to wait for the output relays to drain after the engine exits.
const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a run was not started. No process exists when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum LaunchRejected {
    #[error("Invalid run configuration: {0}")]
    InvalidConfig(String),

    #[error("A load test is already running")]
    AlreadyActive,

    #[error("Test plan not found: {0}")]
    MissingTestPlan(String),

    #[error("Worker servers unreachable: {}", .0.join(", "))]
    WorkersUnreachable(Vec<String>),

    #[error("Failed to prepare run storage: {0}")]
    Storage(#[source] std::io::Error),

    #[error("Failed to start engine: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Why a stop request did nothing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StopError {
    #[error("No load test is running")]
    Idle,

    #[error("The load test is still launching")]
    Launching,
}

// ---------------------------------------------------------------------------
// Public records
// ---------------------------------------------------------------------------

/// Final record of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub test_name: String,
    pub test_plan: String,
    pub exit_code: i32,
    /// Driven by the exit code alone; see `transfer` for data completeness.
    pub succeeded: bool,
    /// Whether the run was ended by a stop request.
    pub stopped: bool,
    pub transfer: TransferReport,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

/// Current state of the supervisor.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<RunOutcome>,
}

/// Resolves once the supervising task has finished the run.
#[derive(Debug)]
pub struct RunCompletion {
    receiver: oneshot::Receiver<RunOutcome>,
}

impl RunCompletion {
    /// Wait for the outcome. `None` if the supervising task died.
    pub async fn wait(self) -> Option<RunOutcome> {
        self.receiver.await.ok()
    }
}

/// An accepted run.
#[derive(Debug)]
pub struct StartedRun {
    pub snapshot: RunSnapshot,
    pub completion: RunCompletion,
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

enum Slot {
    Idle,
    Launching,
    Active(ActiveRun),
}

struct ActiveRun {
    snapshot: RunSnapshot,
    cancel: CancellationToken,
    finished: CancellationToken,
}

struct Inner {
    config: RunnerConfig,
    broker: Arc<LogBroker>,
    notifier: Arc<NotificationDispatcher>,
    slot: RwLock<Slot>,
    last_outcome: RwLock<Option<RunOutcome>>,
}

/// Coordinates the lifecycle of at most one load-test run.
#[derive(Clone)]
pub struct RunSupervisor {
    inner: Arc<Inner>,
}

impl RunSupervisor {
    pub fn new(
        config: RunnerConfig,
        broker: Arc<LogBroker>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                broker,
                notifier,
                slot: RwLock::new(Slot::Idle),
                last_outcome: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.inner.config
    }

    pub fn broker(&self) -> &Arc<LogBroker> {
        &self.inner.broker
    }

    /// Build a run configuration over the configured workers.
    pub fn run_config(
        &self,
        test_plan: impl Into<String>,
        requested_users: u32,
        duration_secs: u32,
        step_num: Option<u32>,
    ) -> RunConfig {
        RunConfig {
            test_plan: test_plan.into(),
            requested_users,
            duration_secs,
            step_num,
            workers: self.inner.config.workers.clone(),
        }
    }

    /// Start a run, or reject it without starting any process.
    ///
    /// While a run is active every request is rejected with
    /// [`LaunchRejected::AlreadyActive`], whatever its parameters.
    pub async fn start(&self, config: RunConfig) -> Result<StartedRun, LaunchRejected> {
        {
            let mut slot = self.inner.slot.write().await;
            if !matches!(*slot, Slot::Idle) {
                self.inner
                    .broker
                    .warn("A load test is already running, start request rejected");
                return Err(LaunchRejected::AlreadyActive);
            }
            *slot = Slot::Launching;
        }

        match self.launch(config).await {
            Ok(started) => Ok(started),
            Err(e) => {
                *self.inner.slot.write().await = Slot::Idle;
                Err(e)
            }
        }
    }

    async fn launch(&self, config: RunConfig) -> Result<StartedRun, LaunchRejected> {
        let inner = &self.inner;
        let broker = &inner.broker;

        config
            .validate()
            .map_err(|e| LaunchRejected::InvalidConfig(e.to_string()))?;

        let plan_path = test_plan_path(&inner.config.test_plan_dir, &config.test_plan);
        if !tokio::fs::try_exists(&plan_path).await.unwrap_or(false) {
            broker.error(format!("Test plan not found: {}", plan_path.display()));
            return Err(LaunchRejected::MissingTestPlan(config.test_plan));
        }

        let report =
            health::check_workers(&config.workers, inner.config.health_timeout, broker).await;
        if !report.all_healthy {
            broker.error("Worker health check failed, run aborted");
            return Err(LaunchRejected::WorkersUnreachable(
                report.unreachable().map(|s| s.server.clone()).collect(),
            ));
        }

        let worker_count = u32::try_from(config.workers.len()).unwrap_or(u32::MAX);
        let users = distribute_users(config.requested_users, worker_count);
        let started_at = chrono::Utc::now();
        let identity = RunIdentity::new(&config.test_plan, users.actual, started_at);
        let paths = RunPaths::allocate(&inner.config.storage, &identity, users.actual);

        prepare_storage(&paths).await.map_err(|e| {
            broker.error(format!("Failed to create run directories: {e}"));
            LaunchRejected::Storage(e)
        })?;
        broker.info(format!("Created report directory: {}", paths.report_dir.display()));

        let invocation = EngineInvocation::new(
            &inner.config.engine_bin,
            plan_path,
            users.per_worker,
            config.duration_secs,
            config.step_num,
            &config.workers,
            &paths,
        );
        broker.info(format!("Executing command: {}", invocation.display()));
        broker.info(format!("Test start time: {}", local(started_at)));

        let mut child = invocation.spawn().map_err(|e| {
            broker.error(format!("Failed to start engine: {e}"));
            LaunchRejected::Spawn(e)
        })?;

        let snapshot = RunSnapshot {
            run_id: identity.run_id,
            test_plan: config.test_plan.clone(),
            test_name: identity.test_name.clone(),
            requested_users: config.requested_users,
            actual_users: users.actual,
            per_worker_users: users.per_worker,
            duration_secs: config.duration_secs,
            step_num: config.step_num,
            workers: config.workers.iter().map(ToString::to_string).collect(),
            started_at,
            phase: RunPhase::Running,
            pid: child.id(),
            paths,
        };
        tracing::info!(
            run_id = %snapshot.run_id,
            test_name = %snapshot.test_name,
            actual_users = snapshot.actual_users,
            pid = ?snapshot.pid,
            "Load test started",
        );

        let relays = spawn_relays(&mut child, broker);
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        let (sender, receiver) = oneshot::channel();

        *inner.slot.write().await = Slot::Active(ActiveRun {
            snapshot: snapshot.clone(),
            cancel: cancel.clone(),
            finished: finished.clone(),
        });

        let task = SuperviseTask {
            inner: Arc::clone(inner),
            snapshot: snapshot.clone(),
            identity,
            child,
            relays,
            cancel,
        };
        let supervised = Arc::clone(inner);
        let run_id = snapshot.run_id;
        tokio::spawn(async move {
            let outcome = supervise(supervised, run_id, task.run()).await;
            finished.cancel();
            if let Some(outcome) = outcome {
                // The receiver may have been dropped; the outcome is kept anyway.
                let _ = sender.send(outcome);
            }
        });

        Ok(StartedRun {
            snapshot,
            completion: RunCompletion { receiver },
        })
    }

    /// Ask the active run's engine to terminate.
    pub async fn stop(&self) -> Result<RunSnapshot, StopError> {
        let slot = self.inner.slot.read().await;
        match &*slot {
            Slot::Idle => Err(StopError::Idle),
            Slot::Launching => Err(StopError::Launching),
            Slot::Active(run) => {
                if !run.cancel.is_cancelled() {
                    self.inner
                        .broker
                        .warn(format!("Stopping load test {}", run.snapshot.test_name));
                    run.cancel.cancel();
                }
                Ok(run.snapshot.clone())
            }
        }
    }

    pub async fn status(&self) -> RunStatus {
        let (running, run) = match &*self.inner.slot.read().await {
            Slot::Idle => (false, None),
            Slot::Launching => (true, None),
            Slot::Active(run) => (true, Some(run.snapshot.clone())),
        };
        RunStatus {
            running,
            run,
            last_outcome: self.last_outcome().await,
        }
    }

    pub async fn is_active(&self) -> bool {
        !matches!(*self.inner.slot.read().await, Slot::Idle)
    }

    pub async fn last_outcome(&self) -> Option<RunOutcome> {
        self.inner.last_outcome.read().await.clone()
    }

    /// One on-demand health pass over the configured workers.
    pub async fn check_workers(&self) -> HealthReport {
        health::check_workers(
            &self.inner.config.workers,
            self.inner.config.health_timeout,
            &self.inner.broker,
        )
        .await
    }

    /// Stop any active run and wait up to `timeout` for it to finish.
    ///
    /// Returns `false` if a run was still active when the timeout expired.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let finished = match &*self.inner.slot.read().await {
            Slot::Active(run) => {
                run.cancel.cancel();
                run.finished.clone()
            }
            Slot::Idle | Slot::Launching => return true,
        };
        tracing::info!("Waiting for the active run to finish");
        tokio::time::timeout(timeout, finished.cancelled())
            .await
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Supervising task
// ---------------------------------------------------------------------------

/// Drive a run's supervision on its own task.
///
/// If it panics the slot it held is released, so the supervisor does not
/// report an active run forever. The engine process is killed when the
/// panicking task drops its `Child`.
async fn supervise<F>(inner: Arc<Inner>, run_id: Uuid, run: F) -> Option<RunOutcome>
where
    F: Future<Output = RunOutcome> + Send + 'static,
{
    match tokio::spawn(run).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!(%run_id, error = %e, "Run supervision task failed");
            inner
                .broker
                .error(format!("Run supervision failed unexpectedly: {e}"));
            release_slot(&inner, run_id).await;
            None
        }
    }
}

/// Clear the slot if it still belongs to `run_id`.
async fn release_slot(inner: &Inner, run_id: Uuid) {
    let mut slot = inner.slot.write().await;
    if matches!(&*slot, Slot::Active(run) if run.snapshot.run_id == run_id) {
        *slot = Slot::Idle;
    }
}

struct SuperviseTask {
    inner: Arc<Inner>,
    snapshot: RunSnapshot,
    identity: RunIdentity,
    child: Child,
    relays: Vec<JoinHandle<u64>>,
    cancel: CancellationToken,
}

impl SuperviseTask {
    async fn run(mut self) -> RunOutcome {
        let broker = Arc::clone(&self.inner.broker);
        let paths = self.snapshot.paths.clone();
        let mut journal = TransferJournal::create(
            &paths.transfer_journal,
            &self.snapshot.test_name,
            self.snapshot.started_at,
            &paths.result_file,
        )
        .await;

        let (exit_code, stopped) = self.wait_for_engine().await;
        self.drain_relays().await;
        broker.info(format!("Engine process completed with exit code: {exit_code}"));
        journal
            .record(format!("Engine process exited with code {exit_code}"))
            .await;

        diagnostics::replay_engine_log(&broker, &paths.engine_log).await;

        self.set_phase(RunPhase::Transferring).await;
        let monitor = ResultTransferMonitor::new(
            self.inner.config.transfer.policy,
            Arc::clone(&self.inner.config.transfer.ticker),
            Arc::clone(&broker),
        );
        let source = FsResultSource::new(&paths.result_file);
        let transfer = monitor.run(&source, &mut journal).await;

        if !transfer.file_seen && exit_code == 0 {
            let anomaly = "Anomaly: engine exited successfully but the result file was never created (check engine configuration and storage permissions)";
            broker.warn(anomaly);
            journal.record(anomaly).await;
        }

        let finished_at = chrono::Utc::now();
        let succeeded = exit_code == 0;
        let base_url = &self.inner.config.public_base_url;
        let outcome_kind = if succeeded {
            broker.info("Distributed load test completed");
            broker.info(format!("Test end time: {}", local(finished_at)));
            broker.info(format!(
                "Test report location: {}",
                paths.report_dir.display()
            ));
            RunOutcomeKind::Succeeded {
                report_url: report_url(base_url, &self.identity),
                report_list_url: report_list_url(base_url),
                transfer_warning: transfer.outcome.warning(),
            }
        } else {
            broker.error(format!("Engine execution failed, exit code: {exit_code}"));
            broker.error(format!(
                "Please check log file: {}",
                paths.engine_log.display()
            ));
            diagnostics::report_failure(&broker, &paths.engine_log, &self.inner.config.engine_bin)
                .await;
            RunOutcomeKind::Failed {
                exit_code,
                engine_log: paths.engine_log.display().to_string(),
            }
        };

        self.set_phase(RunPhase::Notifying).await;
        let message = NotificationMessage {
            test_name: self.snapshot.test_name.clone(),
            test_plan: self.snapshot.test_plan.clone(),
            actual_users: self.snapshot.actual_users,
            started_at: self.snapshot.started_at,
            finished_at,
            outcome: outcome_kind,
        };
        self.inner
            .notifier
            .notify(&message, message.routing_key())
            .await;

        let outcome = RunOutcome {
            run_id: self.snapshot.run_id,
            test_name: self.snapshot.test_name.clone(),
            test_plan: self.snapshot.test_plan.clone(),
            exit_code,
            succeeded,
            stopped,
            transfer,
            started_at: self.snapshot.started_at,
            finished_at,
        };
        tracing::info!(
            run_id = %outcome.run_id,
            exit_code,
            succeeded,
            transfer = ?outcome.transfer.outcome,
            "Load test finished",
        );

        *self.inner.last_outcome.write().await = Some(outcome.clone());
        *self.inner.slot.write().await = Slot::Idle;
        outcome
    }

    /// Wait for the engine to exit, terminating it if a stop is requested.
    ///
    /// Returns the exit code and whether a stop was requested.
    async fn wait_for_engine(&mut self) -> (i32, bool) {
        let waited = tokio::select! {
            status = self.child.wait() => Some(status),
            _ = self.cancel.cancelled() => None,
        };
        let (status, stopped) = match waited {
            Some(status) => (status, false),
            None => {
                terminate(&mut self.child);
                let status = match tokio::time::timeout(TERMINATE_GRACE, self.child.wait()).await {
                    Ok(status) => status,
                    Err(_) => {
                        self.inner
                            .broker
                            .warn("Engine ignored the termination signal, killing it");
                        let _ = self.child.start_kill();
                        self.child.wait().await
                    }
                };
                (status, true)
            }
        };

        match status {
            Ok(status) => (exit_code(status), stopped),
            Err(e) => {
                self.inner
                    .broker
                    .error(format!("Failed to wait for engine process: {e}"));
                (-1, stopped)
            }
        }
    }

    async fn drain_relays(&mut self) {
        for relay in self.relays.drain(..) {
            if tokio::time::timeout(RELAY_DRAIN_TIMEOUT, relay).await.is_err() {
                tracing::warn!("Engine output relay did not finish after exit");
            }
        }
    }

    async fn set_phase(&self, phase: RunPhase) {
        if let Slot::Active(run) = &mut *self.inner.slot.write().await {
            if run.snapshot.run_id == self.snapshot.run_id {
                run.snapshot.phase = phase;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn prepare_storage(paths: &RunPaths) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&paths.report_dir).await?;
    for file in [&paths.result_file, &paths.engine_log, &paths.transfer_journal] {
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Relay stdout and stderr concurrently into the same broker.
fn spawn_relays(child: &mut Child, broker: &Arc<LogBroker>) -> Vec<JoinHandle<u64>> {
    let mut relays = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        let broker = Arc::clone(broker);
        relays.push(tokio::spawn(async move { relay_output(stdout, &broker).await }));
    }
    if let Some(stderr) = child.stderr.take() {
        let broker = Arc::clone(broker);
        relays.push(tokio::spawn(async move { relay_output(stderr, &broker).await }));
    }
    relays
}

/// Send SIGTERM so the engine can shut its workers down cleanly.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        let _ = child.start_kill();
        return;
    };
    // Safety: kill(2) with a valid pid and signal number has no memory effects.
    let ret = unsafe { libc::kill(pid, libc::SIGTERM) };
    if ret != 0 {
        tracing::warn!(pid, error = %std::io::Error::last_os_error(), "SIGTERM failed, killing engine");
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

/// Exit code of the engine; signal deaths map to `128 + signal`.
fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

fn local(ts: Timestamp) -> String {
    ts.with_timezone(&chrono::Local)
        .format(DISPLAY_TIME_FORMAT)
        .to_string()
}
