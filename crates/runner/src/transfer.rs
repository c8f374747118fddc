//! Result transfer monitor.
//!
//! Runs after the engine has exited. Polls the result file until its size
//! settles, validates it, and reports how the transfer phase ended. The
//! decision logic is [`TransferMonitorState`]; this module adds the I/O,
//! the waiting and the logging around it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use loadctl_core::result_file::{validate_result_file, ValidationError, ValidationSummary};
use loadctl_core::transfer::{
    GiveUpReason, Observation, PollAction, TransferMonitorState, TransferPolicy,
};
use loadctl_events::LogBroker;
use serde::Serialize;

use crate::clock::Ticker;
use crate::journal::TransferJournal;

// ---------------------------------------------------------------------------
// Result source
// ---------------------------------------------------------------------------

/// Where the monitor reads the result file from.
#[async_trait]
pub trait ResultSource: Send + Sync {
    async fn inspect(&self) -> Observation;

    async fn validate(&self) -> Result<ValidationSummary, ValidationError>;

    /// Copy the current file aside; `poll` makes the backup name unique.
    async fn backup(&self, poll: u32) -> std::io::Result<PathBuf>;

    fn describe(&self) -> String;
}

/// The result file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsResultSource {
    path: PathBuf,
}

impl FsResultSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn backup_path(&self, poll: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{poll}.bak"));
        PathBuf::from(name)
    }
}

#[async_trait]
impl ResultSource for FsResultSource {
    async fn inspect(&self) -> Observation {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Observation::Size(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Observation::Missing,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to inspect result file"
                );
                Observation::Unreadable
            }
        }
    }

    async fn validate(&self) -> Result<ValidationSummary, ValidationError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || validate_result_file(&path))
            .await
            .unwrap_or_else(|e| Err(ValidationError::Io(std::io::Error::other(e))))
    }

    async fn backup(&self, poll: u32) -> std::io::Result<PathBuf> {
        let target = self.backup_path(poll);
        tokio::fs::copy(&self.path, &target).await?;
        Ok(target)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// How the transfer phase ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// The file settled and passed validation.
    Complete { rows: u64 },
    /// The file settled but never passed validation; it was used as is.
    Unvalidated { error: String },
    /// No result file ever appeared.
    NeverAppeared,
    /// Monitoring stopped for another reason.
    Abandoned { reason: GiveUpReason },
}

impl TransferOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, TransferOutcome::Complete { .. })
    }

    /// Warning line for notifications, `None` when the data was validated.
    pub fn warning(&self) -> Option<String> {
        match self {
            TransferOutcome::Complete { .. } => None,
            TransferOutcome::Unvalidated { error } => {
                Some(format!("result file may be incomplete ({error})"))
            }
            TransferOutcome::NeverAppeared => Some("result file was never created".into()),
            TransferOutcome::Abandoned { reason } => {
                Some(format!("result transfer monitoring abandoned ({reason:?})"))
            }
        }
    }
}

/// Summary of one transfer-monitoring session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReport {
    pub outcome: TransferOutcome,
    pub final_size: u64,
    pub polls: u32,
    pub elapsed_secs: f64,
    pub file_seen: bool,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct ResultTransferMonitor {
    policy: TransferPolicy,
    ticker: Arc<dyn Ticker>,
    broker: Arc<LogBroker>,
}

impl ResultTransferMonitor {
    pub fn new(policy: TransferPolicy, ticker: Arc<dyn Ticker>, broker: Arc<LogBroker>) -> Self {
        Self {
            policy,
            ticker,
            broker,
        }
    }

    /// Poll `source` until the data settles or monitoring gives up.
    ///
    /// Always returns a report; nothing here fails the run.
    pub async fn run(
        &self,
        source: &dyn ResultSource,
        journal: &mut TransferJournal,
    ) -> TransferReport {
        let started = Instant::now();
        let policy = &self.policy;
        let mut state = TransferMonitorState::new();

        self.broker.info("Waiting for worker result data to finish transferring...");
        journal.record("Waiting for worker result data").await;

        let outcome = loop {
            let observation = source.inspect().await;
            let step = state.observe(observation, policy);
            self.log_observation(observation, &state, journal).await;

            if step.backup {
                match source.backup(state.polls).await {
                    Ok(path) => {
                        journal
                            .record(format!("Backed up result file to {}", path.display()))
                            .await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Result file backup failed");
                        journal.record(format!("Result file backup failed: {e}")).await;
                    }
                }
            }

            match step.action {
                PollAction::Wait => {}
                PollAction::Validate => {
                    self.broker.info(format!(
                        "Result data settled at {} bytes, validating",
                        state.previous_size
                    ));
                    match source.validate().await {
                        Ok(summary) => {
                            self.broker.info(format!(
                                "Result file valid: {} data records",
                                summary.data_rows
                            ));
                            journal
                                .record(format!("Validation passed: {} records", summary.data_rows))
                                .await;
                            break TransferOutcome::Complete {
                                rows: summary.data_rows,
                            };
                        }
                        Err(e) => {
                            self.broker
                                .warn(format!("Result file validation failed: {e}"));
                            journal.record(format!("Validation failed: {e}")).await;
                            if let PollAction::GiveUp(_) = state.validation_failed(policy) {
                                self.broker.warn(
                                    "Wait budget exhausted, proceeding with a result file that may be incomplete",
                                );
                                journal
                                    .record("Wait budget exhausted, proceeding with possibly incomplete file")
                                    .await;
                                break TransferOutcome::Unvalidated {
                                    error: e.to_string(),
                                };
                            }
                        }
                    }
                }
                PollAction::GiveUp(reason) => {
                    let message = match reason {
                        GiveUpReason::NeverAppeared => format!(
                            "Result file {} not found after {} attempts, giving up",
                            source.describe(),
                            policy.max_attempts
                        ),
                        GiveUpReason::UnreadableFile => format!(
                            "Could not read result file size after {} attempts, giving up",
                            policy.max_attempts
                        ),
                        GiveUpReason::PollLimit => format!(
                            "Result file still changing after {} polls, giving up",
                            state.polls
                        ),
                        GiveUpReason::ValidationExhausted => {
                            "Result file never passed validation, giving up".to_string()
                        }
                    };
                    self.broker.warn(&message);
                    journal.record(&message).await;
                    break match reason {
                        GiveUpReason::NeverAppeared => TransferOutcome::NeverAppeared,
                        other => TransferOutcome::Abandoned { reason: other },
                    };
                }
            }

            self.ticker.tick().await;
        };

        let elapsed_secs = started.elapsed().as_secs_f64();
        self.broker.info(format!(
            "Result transfer monitoring finished in {elapsed_secs:.1} seconds"
        ));
        journal
            .record(format!("Monitoring finished in {elapsed_secs:.1} seconds"))
            .await;

        TransferReport {
            outcome,
            final_size: state.previous_size,
            polls: state.polls,
            elapsed_secs,
            file_seen: state.file_seen,
        }
    }

    async fn log_observation(
        &self,
        observation: Observation,
        state: &TransferMonitorState,
        journal: &mut TransferJournal,
    ) {
        let message = match observation {
            Observation::Missing => format!(
                "Waiting for result file to be created... ({}/{})",
                state.wait_count, self.policy.max_attempts
            ),
            Observation::Unreadable => format!(
                "Could not read result file size ({}/{})",
                state.wait_count, self.policy.max_attempts
            ),
            Observation::Size(size) => format!(
                "Result file size: {size} bytes (stable for {} checks)",
                state.stable_count
            ),
        };
        match observation {
            Observation::Unreadable => self.broker.warn(&message),
            _ => self.broker.info(&message),
        };
        journal.record(&message).await;
    }
}

/// Whether `path` currently exists; used for post-run anomaly checks.
pub async fn result_file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
