//! Test plan discovery.

use std::path::Path;

use crate::error::CoreError;

/// File extension of engine test plans.
pub const TEST_PLAN_EXTENSION: &str = "jmx";

/// Reject plan names that could escape the plan directory.
pub fn validate_plan_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Test plan name is required".into()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(CoreError::Validation(format!(
            "Invalid test plan name '{name}'"
        )));
    }
    Ok(())
}

/// List plan names (file stem of every `*.jmx`) in `dir`, sorted.
///
/// A missing directory yields an empty list.
pub fn list_test_plans(dir: &Path) -> std::io::Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut plans = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_plan = path
            .extension()
            .is_some_and(|ext| ext == TEST_PLAN_EXTENSION);
        if let (true, Some(stem)) = (is_plan, path.file_stem().and_then(|s| s.to_str())) {
            plans.push(stem.to_string());
        }
    }
    plans.sort();
    Ok(plans)
}
