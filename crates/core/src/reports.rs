//! Stored HTML reports: listing, safe path resolution and content types.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

/// Public URL prefix under which reports are served.
pub const REPORT_URL_PREFIX: &str = "/report/html";

/// Entry page of a report directory.
pub const REPORT_INDEX: &str = "index.html";

/// Summary statistics file the comparison collaborator consumes.
pub const REPORT_STATISTICS: &str = "statistics.json";

/// Content type for unknown extensions.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Extension → content type table for served report files.
const MIME_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("json", "application/json"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("eot", "application/vnd.ms-fontobject"),
    ("otf", "font/otf"),
    ("txt", "text/plain"),
];

/// One stored report as shown in the report list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub name: String,
    /// Embedded timestamp, `%Y%m%d%H%M%S`.
    pub date: String,
    /// URL path of the report's entry page.
    pub path: String,
}

/// Errors resolving a requested report path.
#[derive(Debug, thiserror::Error)]
pub enum ReportPathError {
    #[error("Access denied: invalid path")]
    Traversal,

    #[error("Report file not found: {0}")]
    NotFound(String),
}

/// Content type for `path` based on its extension.
pub fn mime_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return DEFAULT_MIME;
    };
    let ext = ext.to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME)
}

/// Reject relative paths that could escape the report root.
///
/// Runs before any filesystem access: `..` anywhere, absolute paths,
/// backslashes and drive prefixes are refused.
pub fn check_relative_path(requested: &str) -> Result<(), ReportPathError> {
    if requested.contains("..") || requested.starts_with('/') || requested.contains('\\') {
        return Err(ReportPathError::Traversal);
    }
    let all_normal = Path::new(requested)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !all_normal {
        return Err(ReportPathError::Traversal);
    }
    Ok(())
}

/// Resolve `requested` inside `root` to an existing file.
///
/// Directories resolve to their `index.html`.
pub fn resolve_report_path(root: &Path, requested: &str) -> Result<PathBuf, ReportPathError> {
    check_relative_path(requested)?;

    let mut full = root.join(requested);
    if full.is_dir() {
        full = full.join(REPORT_INDEX);
    }
    if !full.is_file() {
        return Err(ReportPathError::NotFound(requested.to_string()));
    }
    Ok(full)
}

/// Split a report directory name into `(name, date)`.
///
/// Directory names look like `checkout-200Vuser_20250506165136` or the
/// older `checkout_20250417174523`; both split on the first `_`.
pub fn parse_report_dir_name(dir_name: &str) -> Option<(String, String)> {
    let mut parts = dir_name.split('_');
    let name = parts.next()?;
    let date = parts.next()?;
    if name.is_empty() || date.is_empty() {
        return None;
    }
    Some((name.to_string(), date.to_string()))
}

/// List report directories under `root` that contain an `index.html`,
/// newest first.
pub fn list_reports(root: &Path) -> std::io::Result<Vec<ReportSummary>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut reports = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() || !path.join(REPORT_INDEX).exists() {
            continue;
        }
        let Some(dir_name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if let Some((name, date)) = parse_report_dir_name(&dir_name) {
            reports.push(ReportSummary {
                name,
                date,
                path: format!("{REPORT_URL_PREFIX}/{dir_name}/{REPORT_INDEX}"),
            });
        }
    }

    reports.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(reports)
}

/// Extract the report directory from a report link such as
/// `/report/html/<dir>/index.html` (the second-to-last segment).
pub fn report_dir_from_link(link: &str) -> Result<String, ReportPathError> {
    let segments: Vec<&str> = link.split('/').collect();
    if segments.len() < 2 {
        return Err(ReportPathError::NotFound(link.to_string()));
    }
    let dir = segments[segments.len() - 2];
    if dir.is_empty() || dir == "." {
        return Err(ReportPathError::NotFound(link.to_string()));
    }
    check_relative_path(dir)?;
    Ok(dir.to_string())
}
