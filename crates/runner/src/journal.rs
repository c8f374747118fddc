//! Per-run transfer diagnostic journal.
//!
//! A plain text file next to the engine log recording every step of the
//! result-transfer phase. Writing it is best-effort: a failed write is
//! logged once and the journal goes quiet for the rest of the run.

use std::path::{Path, PathBuf};

use loadctl_core::types::{Timestamp, DISPLAY_TIME_FORMAT};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

pub struct TransferJournal {
    path: PathBuf,
    file: Option<File>,
}

impl TransferJournal {
    /// Create the journal and write its header.
    pub async fn create(
        path: &Path,
        test_name: &str,
        started_at: Timestamp,
        result_file: &Path,
    ) -> Self {
        let mut journal = Self {
            path: path.to_path_buf(),
            file: None,
        };
        let header = format!(
            "Result transfer diagnostic journal\nTest name: {test_name}\nStart time: {}\nResult file: {}\n\n",
            local(started_at),
            result_file.display()
        );
        match File::create(path).await {
            Ok(file) => {
                journal.file = Some(file);
                journal.write(header.as_bytes()).await;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not create transfer journal");
            }
        }
        journal
    }

    /// A journal that records nothing.
    pub fn disabled(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.file.is_some()
    }

    /// Append one timestamped line.
    pub async fn record(&mut self, message: impl AsRef<str>) {
        if self.file.is_none() {
            return;
        }
        let line = format!("[{}] {}\n", local(chrono::Utc::now()), message.as_ref());
        self.write(line.as_bytes()).await;
    }

    async fn write(&mut self, bytes: &[u8]) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let result = match file.write_all(bytes).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "Transfer journal write failed");
            self.file = None;
        }
    }
}

fn local(ts: Timestamp) -> String {
    ts.with_timezone(&chrono::Local)
        .format(DISPLAY_TIME_FORMAT)
        .to_string()
}
