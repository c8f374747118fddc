use std::path::PathBuf;

use loadctl_core::logging::LogLevel;
use loadctl_core::run::StorageRoots;
use loadctl_core::worker::WorkerServer;
use loadctl_events::{NotificationConfig, WebhookRoutes};
use loadctl_runner::RunnerConfig;

/// Configuration errors. Any of these aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Server configuration loaded from environment variables.
///
/// Read once at startup. In production, override via environment variables
/// or a `.env` file.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5001`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for an active run to wind down (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub engine_bin: PathBuf,
    pub test_plan_dir: PathBuf,
    pub report_dir: PathBuf,
    pub result_dir: PathBuf,
    pub log_dir: PathBuf,
    pub workers: Vec<WorkerServer>,
    /// Base of links in notifications.
    pub public_base_url: String,
    pub notifications: NotificationConfig,
    /// Run-log threshold.
    pub log_level: LogLevel,
    /// External comparison program and leading args; `None` disables compare.
    pub compare_command: Option<String>,
    pub compare_output_dir: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                    |
    /// |--------------------------|----------------------------|
    /// | `HOST`                   | `0.0.0.0`                  |
    /// | `PORT`                   | `5001`                     |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                       |
    /// | `ENGINE_BIN`             | `apache-jmeter/bin/jmeter` |
    /// | `TEST_PLAN_DIR`          | `testplan`                 |
    /// | `REPORT_DIR`             | `report/html`              |
    /// | `RESULT_DIR`             | `jtl`                      |
    /// | `LOG_DIR`                | `log`                      |
    /// | `WORKER_SERVERS`         | required                   |
    /// | `PUBLIC_BASE_URL`        | `http://127.0.0.1:5001`    |
    /// | `NOTIFICATIONS_ENABLED`  | `true`                     |
    /// | `NOTIFY_WEBHOOK_DEFAULT` | unset                      |
    /// | `NOTIFY_WEBHOOK_ROUTES`  | unset (`key=url;key=url`)  |
    /// | `LOG_LEVEL`              | `1` (INFO)                 |
    /// | `COMPARE_COMMAND`        | unset                      |
    /// | `COMPARE_OUTPUT_DIR`     | `reportdiff/analysis`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());

        let port = parse_num("PORT", &var("PORT", "5001"))?;
        let request_timeout_secs =
            parse_num("REQUEST_TIMEOUT_SECS", &var("REQUEST_TIMEOUT_SECS", "30"))?;
        let shutdown_timeout_secs =
            parse_num("SHUTDOWN_TIMEOUT_SECS", &var("SHUTDOWN_TIMEOUT_SECS", "30"))?;

        let cors_origins = var("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let workers_raw = lookup("WORKER_SERVERS")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("WORKER_SERVERS"))?;
        let workers = WorkerServer::parse_list(&workers_raw).map_err(|e| ConfigError::Invalid {
            name: "WORKER_SERVERS",
            reason: e.to_string(),
        })?;

        let notifications_enabled = parse_bool(
            "NOTIFICATIONS_ENABLED",
            &var("NOTIFICATIONS_ENABLED", "true"),
        )?;
        let routes = WebhookRoutes::parse(
            lookup("NOTIFY_WEBHOOK_DEFAULT"),
            &var("NOTIFY_WEBHOOK_ROUTES", ""),
        )
        .map_err(|e| ConfigError::Invalid {
            name: "NOTIFY_WEBHOOK_ROUTES",
            reason: e.to_string(),
        })?;

        let log_level = var("LOG_LEVEL", "1")
            .parse::<LogLevel>()
            .map_err(|e| ConfigError::Invalid {
                name: "LOG_LEVEL",
                reason: e.to_string(),
            })?;

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            engine_bin: var("ENGINE_BIN", "apache-jmeter/bin/jmeter").into(),
            test_plan_dir: var("TEST_PLAN_DIR", "testplan").into(),
            report_dir: var("REPORT_DIR", "report/html").into(),
            result_dir: var("RESULT_DIR", "jtl").into(),
            log_dir: var("LOG_DIR", "log").into(),
            workers,
            public_base_url: var("PUBLIC_BASE_URL", "http://127.0.0.1:5001"),
            notifications: NotificationConfig {
                enabled: notifications_enabled,
                routes,
            },
            log_level,
            compare_command: lookup("COMPARE_COMMAND").filter(|s| !s.trim().is_empty()),
            compare_output_dir: var("COMPARE_OUTPUT_DIR", "reportdiff/analysis").into(),
        })
    }

    pub fn storage(&self) -> StorageRoots {
        StorageRoots {
            report_dir: self.report_dir.clone(),
            result_dir: self.result_dir.clone(),
            log_dir: self.log_dir.clone(),
        }
    }

    /// Runner settings with default polling and timeouts.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::new(
            &self.engine_bin,
            &self.test_plan_dir,
            self.storage(),
            self.workers.clone(),
            &self.public_base_url,
        )
    }
}

fn parse_num<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}
