//! Runner settings, assembled once at startup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use loadctl_core::run::StorageRoots;
use loadctl_core::transfer::TransferPolicy;
use loadctl_core::worker::WorkerServer;

use crate::clock::{SleepTicker, Ticker};

/// Default pause between result-file polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default per-worker connection timeout of the health check.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Polling behaviour of the result transfer monitor.
#[derive(Clone)]
pub struct TransferSettings {
    pub policy: TransferPolicy,
    pub ticker: Arc<dyn Ticker>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            policy: TransferPolicy::default(),
            ticker: Arc::new(SleepTicker::new(DEFAULT_POLL_INTERVAL)),
        }
    }
}

impl std::fmt::Debug for TransferSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferSettings")
            .field("policy", &self.policy)
            .field("interval", &self.ticker.interval())
            .finish()
    }
}

/// Everything the supervisor needs to launch and follow a run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Engine executable.
    pub engine_bin: PathBuf,
    /// Directory holding `<name>.jmx` test plans.
    pub test_plan_dir: PathBuf,
    pub storage: StorageRoots,
    /// Worker servers every run is distributed across.
    pub workers: Vec<WorkerServer>,
    /// Base of links in notifications.
    pub public_base_url: String,
    pub health_timeout: Duration,
    pub transfer: TransferSettings,
}

impl RunnerConfig {
    /// Config with default timeouts and polling.
    pub fn new(
        engine_bin: impl Into<PathBuf>,
        test_plan_dir: impl Into<PathBuf>,
        storage: StorageRoots,
        workers: Vec<WorkerServer>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            engine_bin: engine_bin.into(),
            test_plan_dir: test_plan_dir.into(),
            storage,
            workers,
            public_base_url: public_base_url.into(),
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            transfer: TransferSettings::default(),
        }
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn with_transfer(mut self, transfer: TransferSettings) -> Self {
        self.transfer = transfer;
        self
    }
}
