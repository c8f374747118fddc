//! Completion detection for result data replicated from remote workers.
//!
//! The engine exiting does not mean every worker's results have landed in
//! the local result file. Completion is inferred from the file size: once it
//! stops changing for a few consecutive polls the file is validated. This
//! module holds the pure state machine; the polling loop lives in
//! `loadctl-runner`.

use serde::{Deserialize, Serialize};

/// Tunables of the transfer monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    /// Stall budget: polls without a result file (or failed validations)
    /// before giving up.
    pub max_attempts: u32,
    /// Consecutive equal-size observations required before validating.
    pub stable_threshold: u32,
    /// Take a backup copy every this many polls.
    pub backup_every: u32,
    /// Absolute ceiling on polls, whatever the file does.
    pub hard_poll_limit: u32,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            stable_threshold: 3,
            backup_every: 10,
            hard_poll_limit: 900,
        }
    }
}

/// What one poll saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The result file does not exist yet.
    Missing,
    /// The result file exists with this size in bytes.
    Size(u64),
    /// The file could not be inspected.
    Unreadable,
}

/// Why monitoring stopped without a validated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiveUpReason {
    /// The file never appeared within the stall budget.
    NeverAppeared,
    /// The file could not be inspected within the stall budget.
    UnreadableFile,
    /// The file settled but kept failing validation.
    ValidationExhausted,
    /// The absolute poll ceiling was reached.
    PollLimit,
}

/// Next thing the polling loop should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAction {
    /// Sleep one interval and poll again.
    Wait,
    /// The size has settled; validate the file.
    Validate,
    /// Stop monitoring.
    GiveUp(GiveUpReason),
}

/// Outcome of feeding one observation to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStep {
    pub action: PollAction,
    /// A backup copy of the file should be taken before continuing.
    pub backup: bool,
}

/// Mutable bookkeeping of one monitoring session.
///
/// Owned by a single monitor for the duration of one run and discarded
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct TransferMonitorState {
    pub previous_size: u64,
    pub stable_count: u32,
    pub wait_count: u32,
    pub polls: u32,
    pub file_seen: bool,
}

impl TransferMonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the result of one poll.
    pub fn observe(&mut self, observation: Observation, policy: &TransferPolicy) -> PollStep {
        self.polls += 1;

        let step = match observation {
            Observation::Missing => {
                self.wait_count += 1;
                PollStep {
                    action: self.stall_action(policy, GiveUpReason::NeverAppeared),
                    backup: false,
                }
            }
            Observation::Unreadable => {
                self.wait_count += 1;
                PollStep {
                    action: self.stall_action(policy, GiveUpReason::UnreadableFile),
                    backup: false,
                }
            }
            Observation::Size(size) => {
                self.file_seen = true;
                let backup = policy.backup_every > 0
                    && self.polls % policy.backup_every == 0
                    && size > 0;

                if size == self.previous_size {
                    self.stable_count += 1;
                } else {
                    self.stable_count = 0;
                    if size > self.previous_size {
                        // Growth means the transfer is alive, not stalled.
                        self.wait_count = 0;
                    }
                }
                self.previous_size = size;

                let action = if self.stable_count >= policy.stable_threshold {
                    PollAction::Validate
                } else {
                    PollAction::Wait
                };
                PollStep { action, backup }
            }
        };

        if step.action == PollAction::Wait && self.polls >= policy.hard_poll_limit {
            return PollStep {
                action: PollAction::GiveUp(GiveUpReason::PollLimit),
                ..step
            };
        }
        step
    }

    /// Record a failed validation of a settled file.
    ///
    /// Returns [`PollAction::Wait`] while stall budget remains, otherwise
    /// gives up; the caller then proceeds with the file as it is.
    pub fn validation_failed(&mut self, policy: &TransferPolicy) -> PollAction {
        if self.wait_count < policy.max_attempts && self.polls < policy.hard_poll_limit {
            self.stable_count = 0;
            self.wait_count += 1;
            PollAction::Wait
        } else {
            PollAction::GiveUp(GiveUpReason::ValidationExhausted)
        }
    }

    fn stall_action(&self, policy: &TransferPolicy, reason: GiveUpReason) -> PollAction {
        if self.wait_count >= policy.max_attempts {
            PollAction::GiveUp(reason)
        } else {
            PollAction::Wait
        }
    }
}
