//! Run-outcome notification messages.
//!
//! A [`NotificationMessage`] is built once per run termination, rendered to
//! markdown and handed to the dispatcher. It is never persisted.

use std::fmt::Write;

use serde::Serialize;

use crate::types::{Timestamp, DISPLAY_TIME_FORMAT};

/// Success or failure of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcomeKind {
    Succeeded {
        report_url: String,
        report_list_url: String,
        /// Set when the result data could not be confirmed complete.
        transfer_warning: Option<String>,
    },
    Failed {
        exit_code: i32,
        engine_log: String,
    },
}

/// Everything needed to tell people how a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationMessage {
    pub test_name: String,
    pub test_plan: String,
    pub actual_users: u32,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub outcome: RunOutcomeKind,
}

impl NotificationMessage {
    /// Routing key used to pick a notification endpoint.
    pub fn routing_key(&self) -> &str {
        &self.test_plan
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RunOutcomeKind::Succeeded { .. })
    }

    /// Render the message as markdown.
    pub fn to_markdown(&self) -> String {
        let started = format_local(self.started_at);
        let mut out = String::new();

        match &self.outcome {
            RunOutcomeKind::Succeeded {
                report_url,
                report_list_url,
                transfer_warning,
            } => {
                let _ = writeln!(out, "### {} distributed load test report\n", self.test_name);
                let _ = writeln!(
                    out,
                    "- Worker status: <font color=\"info\">all workers healthy</font>"
                );
                let _ = writeln!(
                    out,
                    "- Run status: <font color=\"info\">completed successfully</font>"
                );
                let _ = writeln!(out, "- Actual concurrent users: {}", self.actual_users);
                let _ = writeln!(out, "- Start time: {started}");
                let _ = writeln!(out, "- End time: {}", format_local(self.finished_at));
                let _ = writeln!(
                    out,
                    "- Duration: {}",
                    format_duration(self.started_at, self.finished_at)
                );
                if let Some(warning) = transfer_warning {
                    let _ = writeln!(
                        out,
                        "- Result data: <font color=\"warning\">{warning}</font>"
                    );
                }
                let _ = writeln!(out, "- Report: [open]({report_url})");
                let _ = writeln!(out, "- All reports: [report list]({report_list_url})");
            }
            RunOutcomeKind::Failed {
                exit_code,
                engine_log,
            } => {
                let _ = writeln!(out, "### {} distributed load test failed\n", self.test_name);
                let _ = writeln!(out, "- Start time: {started}");
                let _ = writeln!(
                    out,
                    "- Failure: engine terminated abnormally, exit code {exit_code}"
                );
                let _ = writeln!(out, "- Engine log: {engine_log}");
            }
        }
        out
    }
}

/// `Xm Ys` between two instants. Negative spans render as `0m 0s`.
pub fn format_duration(start: Timestamp, end: Timestamp) -> String {
    let secs = (end - start).num_seconds().max(0);
    format!("{}m {}s", secs / 60, secs % 60)
}

fn format_local(ts: Timestamp) -> String {
    ts.with_timezone(&chrono::Local)
        .format(DISPLAY_TIME_FORMAT)
        .to_string()
}
