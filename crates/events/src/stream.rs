//! A single observer's view of the [`LogBroker`](crate::LogBroker).
//!
//! Each observer owns its own broadcast receiver, so a slow or vanished
//! observer never holds back publication or other observers. While no entry
//! arrives for one heartbeat interval the stream yields
//! [`StreamEvent::Heartbeat`] to keep idle connections alive.

use std::collections::VecDeque;
use std::time::Duration;

use loadctl_core::logging::LogEntry;
use serde_json::json;
use tokio::sync::broadcast;

/// One item delivered to a log-stream observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Entry(LogEntry),
    Heartbeat,
}

impl StreamEvent {
    /// JSON body of the event: `{"message": "..."}` or `{"heartbeat": true}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            StreamEvent::Entry(entry) => json!({
                "message": entry.to_string(),
                "level": entry.level,
                "timestamp": entry.timestamp,
            }),
            StreamEvent::Heartbeat => json!({ "heartbeat": true }),
        }
    }
}

/// Live feed of log entries for one observer.
pub struct LogStream {
    receiver: broadcast::Receiver<LogEntry>,
    heartbeat: Duration,
    replay: VecDeque<LogEntry>,
}

impl LogStream {
    pub fn new(receiver: broadcast::Receiver<LogEntry>, heartbeat: Duration) -> Self {
        Self::with_backlog(receiver, heartbeat, VecDeque::new())
    }

    /// Stream that yields `replay` before any live entry.
    pub fn with_backlog(
        receiver: broadcast::Receiver<LogEntry>,
        heartbeat: Duration,
        replay: VecDeque<LogEntry>,
    ) -> Self {
        Self {
            receiver,
            heartbeat,
            replay,
        }
    }

    /// Wait for the next entry, or a heartbeat after one idle interval.
    ///
    /// Returns `None` once the broker has been dropped.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if let Some(entry) = self.replay.pop_front() {
            return Some(StreamEvent::Entry(entry));
        }
        loop {
            match tokio::time::timeout(self.heartbeat, self.receiver.recv()).await {
                Err(_elapsed) => return Some(StreamEvent::Heartbeat),
                Ok(Ok(entry)) => return Some(StreamEvent::Entry(entry)),
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "Log stream observer lagged, skipping entries");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
            }
        }
    }
}
