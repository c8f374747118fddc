//! Remote worker servers that execute generated load for the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Port on which engine worker servers accept coordination connections.
pub const COORDINATION_PORT: u16 = 1099;

/// A remote worker server address.
///
/// Health is deliberately not stored here: it is a point-in-time check that
/// is re-run before every launch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerServer {
    pub host: String,
    pub port: u16,
}

impl WorkerServer {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: COORDINATION_PORT,
        }
    }

    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host` or `host:port`. Bare hosts get [`COORDINATION_PORT`].
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CoreError::Validation("Worker address is empty".into()));
        }
        match raw.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.contains(':') => {
                let port: u16 = port.parse().map_err(|_| {
                    CoreError::Validation(format!("Invalid port in worker address '{raw}'"))
                })?;
                Ok(Self::with_port(host, port))
            }
            Some(_) => Err(CoreError::Validation(format!(
                "Invalid worker address '{raw}'"
            ))),
            None => Ok(Self::new(raw)),
        }
    }

    /// Parse a comma-separated worker list, skipping blank items.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, CoreError> {
        raw.split(',')
            .filter(|s| !s.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl fmt::Display for WorkerServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The engine's `-R` argument: hosts joined by commas.
///
/// Non-default ports are kept so the engine can reach them.
pub fn engine_worker_list(workers: &[WorkerServer]) -> String {
    workers
        .iter()
        .map(|w| {
            if w.port == COORDINATION_PORT {
                w.host.clone()
            } else {
                w.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
