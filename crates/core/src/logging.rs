//! Run-log severity levels and entries.
//!
//! A [`LogEntry`] is what live observers of a run see. Entries are produced
//! by the supervisor itself and by the engine output relay, and filtered
//! against a single process-wide [`LogLevel`] threshold.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, DISPLAY_TIME_FORMAT};

/// Severity of a run-log entry, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug = 0,
    #[default]
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Whether an entry at `self` passes the given threshold.
    pub fn passes(self, threshold: LogLevel) -> bool {
        self >= threshold
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a log level string is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("Unknown log level '{0}' (expected 0-3 or debug|info|warn|error)")]
pub struct ParseLogLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    /// Accepts the numeric form (`0`..`3`) as well as level names in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "debug" => Ok(LogLevel::Debug),
            "1" | "info" => Ok(LogLevel::Info),
            "2" | "warn" | "warning" => Ok(LogLevel::Warn),
            "3" | "error" => Ok(LogLevel::Error),
            _ => Err(ParseLogLevelError(s.to_string())),
        }
    }
}

/// A single run-log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    /// Renders as `[2024-05-06 16:51:36] [INFO] message`, in local time.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local = self.timestamp.with_timezone(&chrono::Local);
        write!(
            f,
            "[{}] [{}] {}",
            local.format(DISPLAY_TIME_FORMAT),
            self.level,
            self.message
        )
    }
}
