//! Run configuration, load distribution and per-run artifact naming.
//!
//! Pure logic. The supervisor in `loadctl-runner` owns the live state; this
//! module only describes it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::test_plans::validate_plan_name;
use crate::types::{Timestamp, STAMP_FORMAT};
use crate::worker::WorkerServer;

/// Parameters of a load-test run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Test plan name, without the `.jmx` extension.
    pub test_plan: String,
    /// Requested total virtual users across all workers.
    pub requested_users: u32,
    /// Hold duration passed to the engine, in seconds.
    pub duration_secs: u32,
    /// Optional ramp step count forwarded to the engine.
    pub step_num: Option<u32>,
    pub workers: Vec<WorkerServer>,
}

impl RunConfig {
    /// Structural checks that need no filesystem or network access.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_plan_name(&self.test_plan)?;
        if self.requested_users == 0 {
            return Err(CoreError::Validation(
                "Requested users must be at least 1".into(),
            ));
        }
        if self.duration_secs == 0 {
            return Err(CoreError::Validation(
                "Duration must be at least 1 second".into(),
            ));
        }
        if self.workers.is_empty() {
            return Err(CoreError::Validation(
                "At least one worker server is required".into(),
            ));
        }
        Ok(())
    }
}

/// How requested users are spread across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDistribution {
    pub per_worker: u32,
    pub actual: u32,
}

/// Split `requested` users evenly across `workers`, rounding up.
///
/// The actual concurrency is always a multiple of the worker count, so it can
/// exceed what was requested. `workers` must be non-zero.
pub fn distribute_users(requested: u32, workers: u32) -> UserDistribution {
    debug_assert!(workers > 0, "worker count must be non-zero");
    let workers = workers.max(1);
    let per_worker = requested.div_ceil(workers);
    UserDistribution {
        per_worker,
        actual: per_worker * workers,
    }
}

/// Lifecycle phase of the active run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Slot reserved, pre-flight checks in progress.
    Launching,
    /// Engine process running.
    Running,
    /// Engine exited, waiting for result data to settle.
    Transferring,
    /// Sending the outcome notification.
    Notifying,
}

/// Storage roots under which per-run artifacts are allocated.
#[derive(Debug, Clone)]
pub struct StorageRoots {
    pub report_dir: PathBuf,
    pub result_dir: PathBuf,
    pub log_dir: PathBuf,
}

/// Files and directories belonging to one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPaths {
    pub result_file: PathBuf,
    pub engine_log: PathBuf,
    pub report_dir: PathBuf,
    pub transfer_journal: PathBuf,
}

/// Name and timestamp identifying a run's artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    pub run_id: Uuid,
    /// `<plan>-<actualUsers>Vuser`.
    pub test_name: String,
    /// Local start time in [`STAMP_FORMAT`].
    pub stamp: String,
}

impl RunIdentity {
    pub fn new(test_plan: &str, actual_users: u32, started_at: Timestamp) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            test_name: format!("{test_plan}-{actual_users}Vuser"),
            stamp: started_at
                .with_timezone(&chrono::Local)
                .format(STAMP_FORMAT)
                .to_string(),
        }
    }

    /// Directory name of this run's report: `<test_name>_<stamp>`.
    pub fn report_dir_name(&self) -> String {
        format!("{}_{}", self.test_name, self.stamp)
    }
}

impl RunPaths {
    pub fn allocate(roots: &StorageRoots, identity: &RunIdentity, actual_users: u32) -> Self {
        let file_stem = format!("report-{actual_users}_{}", identity.stamp);
        Self {
            result_file: roots.result_dir.join(format!("{file_stem}.jtl")),
            engine_log: roots.log_dir.join(format!("{file_stem}.log")),
            report_dir: roots.report_dir.join(identity.report_dir_name()),
            transfer_journal: roots.log_dir.join(format!(
                "transfer_{}_{}.log",
                identity.test_name, identity.stamp
            )),
        }
    }
}

/// Point-in-time view of the active run, safe to hand out to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub test_plan: String,
    pub test_name: String,
    pub requested_users: u32,
    pub actual_users: u32,
    pub per_worker_users: u32,
    pub duration_secs: u32,
    pub step_num: Option<u32>,
    pub workers: Vec<String>,
    pub started_at: Timestamp,
    pub phase: RunPhase,
    pub pid: Option<u32>,
    pub paths: RunPaths,
}

/// Link to a run's HTML report under the public base URL.
pub fn report_url(base_url: &str, identity: &RunIdentity) -> String {
    format!(
        "{}/report/html/{}/index.html",
        base_url.trim_end_matches('/'),
        identity.report_dir_name()
    )
}

/// Link to the report list page under the public base URL.
pub fn report_list_url(base_url: &str) -> String {
    format!("{}/report-list", base_url.trim_end_matches('/'))
}

/// Path of the test plan artifact for `name` inside `plan_dir`.
pub fn test_plan_path(plan_dir: &Path, name: &str) -> PathBuf {
    plan_dir.join(format!("{name}.jmx"))
}
