/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Human-readable timestamp format used in run logs and notifications.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compact timestamp embedded in report directory and result file names.
pub const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";
