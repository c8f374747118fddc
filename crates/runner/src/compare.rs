//! Report comparison.
//!
//! The comparison itself is an external collaborator: given the statistics
//! files of two reports it writes a diff artifact. [`compare_reports`]
//! locates the inputs and builds the redirect to the result page.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use loadctl_core::reports::{report_dir_from_link, ReportPathError, REPORT_STATISTICS};
use serde::Serialize;
use tokio::process::Command;

/// Errors from a report comparison.
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("Report comparison is not configured")]
    Unavailable,

    #[error(transparent)]
    Path(#[from] ReportPathError),

    #[error("Statistics file not found: {0}")]
    MissingStatistics(String),

    #[error("Comparison I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Comparison failed with exit code {exit_code}: {stderr}")]
    Failed { exit_code: i32, stderr: String },
}

/// Produces a diff artifact from two statistics files.
#[async_trait]
pub trait ReportComparer: Send + Sync {
    /// Compare `first` with `second`, writing `output_dir/output_name`.
    /// Returns the written artifact's path.
    async fn compare(
        &self,
        first: &Path,
        second: &Path,
        output_dir: &Path,
        output_name: &str,
    ) -> Result<PathBuf, CompareError>;
}

/// Runs an external program as
/// `<program> [args..] <first> <second> <output_dir> <output_name>`.
#[derive(Debug, Clone)]
pub struct CommandComparer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandComparer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line; `None` when blank.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts.map(str::to_owned).collect()))
    }
}

#[async_trait]
impl ReportComparer for CommandComparer {
    async fn compare(
        &self,
        first: &Path,
        second: &Path,
        output_dir: &Path,
        output_name: &str,
    ) -> Result<PathBuf, CompareError> {
        tokio::fs::create_dir_all(output_dir).await?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(first)
            .arg(second)
            .arg(output_dir)
            .arg(output_name)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(CompareError::Failed {
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output_dir.join(output_name))
    }
}

/// Where the result page finds a finished comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    pub redirect: String,
    pub data_file: String,
}

/// Compare the reports behind two report links.
///
/// Links look like `/report/html/<dir>/index.html`; each `<dir>` must hold a
/// statistics file under `report_root`.
pub async fn compare_reports(
    comparer: &dyn ReportComparer,
    report_root: &Path,
    output_dir: &Path,
    first_link: &str,
    second_link: &str,
) -> Result<ComparisonResult, CompareError> {
    let first = statistics_path(report_root, first_link)?;
    let second = statistics_path(report_root, second_link)?;

    let ts = chrono::Utc::now().timestamp();
    let data_file = format!("performance_data_{ts}.json");
    let written = comparer
        .compare(&first, &second, output_dir, &data_file)
        .await?;
    tracing::info!(
        first = %first.display(),
        second = %second.display(),
        output = %written.display(),
        "Report comparison written"
    );

    Ok(ComparisonResult {
        redirect: format!("result.html?t={ts}&data_file={data_file}"),
        data_file,
    })
}

fn statistics_path(report_root: &Path, link: &str) -> Result<PathBuf, CompareError> {
    let dir = report_dir_from_link(link)?;
    let path = report_root.join(dir).join(REPORT_STATISTICS);
    if !path.is_file() {
        return Err(CompareError::MissingStatistics(path.display().to_string()));
    }
    Ok(path)
}
