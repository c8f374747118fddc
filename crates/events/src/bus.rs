//! In-process run-log broker backed by a `tokio::sync::broadcast` channel.
//!
//! [`LogBroker`] is the single fan-out point for [`LogEntry`]s. It is shared
//! via `Arc<LogBroker>` between the supervisor, the output relay and every
//! live log-stream observer.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use loadctl_core::logging::{LogEntry, LogLevel};
use tokio::sync::broadcast;

use crate::stream::LogStream;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 4096;

/// Entries kept for the next observer while nobody is listening.
pub const BACKLOG_CAPACITY: usize = 512;

/// Idle time after which an observer receives a heartbeat.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Fan-out hub for run-log entries.
///
/// Publishing never waits on observers. When an observer falls more than
/// the channel capacity behind, it skips its own oldest entries; other
/// observers and producers are unaffected.
///
/// Entries published while no observer is connected go to a bounded
/// backlog (oldest dropped first). The next [`stream`](Self::stream) replays
/// and clears it, so a client that connects just after a launch still sees
/// the opening lines of the run.
pub struct LogBroker {
    sender: broadcast::Sender<LogEntry>,
    threshold: LogLevel,
    backlog: Mutex<VecDeque<LogEntry>>,
    backlog_capacity: usize,
}

impl LogBroker {
    /// Create a broker with a specific channel capacity and level threshold.
    pub fn new(capacity: usize, threshold: LogLevel) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            threshold,
            backlog: Mutex::new(VecDeque::new()),
            backlog_capacity: BACKLOG_CAPACITY.min(capacity),
        }
    }

    /// Create a broker with the default capacity.
    pub fn with_threshold(threshold: LogLevel) -> Self {
        Self::new(DEFAULT_CAPACITY, threshold)
    }

    pub fn threshold(&self) -> LogLevel {
        self.threshold
    }

    /// Whether entries at `level` are currently emitted.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level.passes(self.threshold)
    }

    /// Publish an entry to all current observers.
    ///
    /// With no observers the entry is kept in the backlog for the next
    /// [`stream`](Self::stream).
    pub fn publish(&self, entry: LogEntry) {
        let mut backlog = self.backlog();
        // A SendError only means there are zero receivers.
        if let Err(broadcast::error::SendError(entry)) = self.sender.send(entry) {
            if backlog.len() >= self.backlog_capacity {
                backlog.pop_front();
            }
            backlog.push_back(entry);
        }
    }

    /// Build, echo and publish an entry if `level` passes the threshold.
    ///
    /// Returns the published entry, or `None` when it was filtered out.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> Option<LogEntry> {
        if !self.enabled(level) {
            return None;
        }
        let entry = LogEntry::new(level, message);
        echo(&entry);
        self.publish(entry.clone());
        Some(entry)
    }

    pub fn debug(&self, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Option<LogEntry> {
        self.log(LogLevel::Error, message)
    }

    /// Raw receiver for every entry published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    /// Observer stream with the default heartbeat interval.
    pub fn stream(&self) -> LogStream {
        self.stream_with_heartbeat(HEARTBEAT_INTERVAL)
    }

    /// Observer stream that first replays the backlog, then follows live
    /// entries.
    pub fn stream_with_heartbeat(&self, heartbeat: Duration) -> LogStream {
        // Subscribing under the backlog lock keeps replay and live entries
        // free of gaps and duplicates.
        let mut backlog = self.backlog();
        let receiver = self.subscribe();
        LogStream::with_backlog(receiver, heartbeat, backlog.drain(..).collect())
    }

    /// Number of entries waiting for the next observer.
    pub fn backlog_len(&self) -> usize {
        self.backlog().len()
    }

    fn backlog(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        // A poisoned queue still holds whole entries.
        self.backlog.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LogBroker {
    fn default() -> Self {
        Self::with_threshold(LogLevel::default())
    }
}

/// Write the entry to the process console through `tracing`.
fn echo(entry: &LogEntry) {
    let message = entry.message.as_str();
    match entry.level {
        LogLevel::Debug => tracing::debug!(target: "loadctl::run", "{message}"),
        LogLevel::Info => tracing::info!(target: "loadctl::run", "{message}"),
        LogLevel::Warn => tracing::warn!(target: "loadctl::run", "{message}"),
        LogLevel::Error => tracing::error!(target: "loadctl::run", "{message}"),
    }
}
