//! Structural validation of result-data files.
//!
//! A result file is delimited text: a header line containing the
//! [`TIMESTAMP_MARKER`] column followed by one record per line. Validation
//! only checks shape (presence, header, last-record width), never metric
//! semantics.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;

/// Column name that must appear in the header line.
pub const TIMESTAMP_MARKER: &str = "timeStamp";

/// Field delimiter of result records.
pub const FIELD_DELIMITER: char = ',';

/// Minimum number of fields a complete record carries.
pub const MIN_RECORD_FIELDS: usize = 5;

/// Why a result file failed validation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Result file does not exist")]
    NotFound,

    #[error("Result file is empty")]
    Empty,

    #[error("Header line is missing the 'timeStamp' column")]
    BadHeader,

    #[error("Last record is incomplete ({fields} fields, expected at least 5)")]
    Truncated { fields: usize },

    #[error("Failed to read result file: {0}")]
    Io(#[from] std::io::Error),
}

/// Successful validation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    /// Number of lines after the header.
    pub data_rows: u64,
}

/// Validate the result file at `path`.
///
/// Reads the file once, line by line, so large files are not held in memory.
pub fn validate_result_file(path: &Path) -> Result<ValidationSummary, ValidationError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ValidationError::NotFound)
        }
        Err(e) => return Err(e.into()),
    };
    if metadata.len() == 0 {
        return Err(ValidationError::Empty);
    }

    let mut lines = BufReader::new(File::open(path)?).lines();

    let header = lines.next().transpose()?.unwrap_or_default();
    if !header.contains(TIMESTAMP_MARKER) {
        return Err(ValidationError::BadHeader);
    }

    let mut data_rows = 0u64;
    let mut last_line = None;
    for line in lines {
        data_rows += 1;
        last_line = Some(line?);
    }

    if let Some(last) = last_line {
        let last = last.trim();
        let fields = if last.is_empty() {
            0
        } else {
            last.split(FIELD_DELIMITER).count()
        };
        if fields < MIN_RECORD_FIELDS {
            return Err(ValidationError::Truncated { fields });
        }
    }

    Ok(ValidationSummary { data_rows })
}
