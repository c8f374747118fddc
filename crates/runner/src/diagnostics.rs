//! Post-run diagnostics read from the engine log.

use std::collections::VecDeque;
use std::path::Path;

use loadctl_core::logging::LogLevel;
use loadctl_events::LogBroker;
use tokio::io::BufReader;

use crate::relay::read_line_lossy;

/// Engine-log lines shown after a failed run.
pub const FAILURE_TAIL_LINES: usize = 20;

/// Words marking engine-log lines worth replaying at DEBUG.
const REPLAY_KEYWORDS: [&str; 5] = ["threads", "sample", "duration", "summary", "throughput"];

/// Last `n` lines of the file at `path`, decoded lossily.
pub async fn tail_lines(path: &Path, n: usize) -> std::io::Result<Vec<String>> {
    let file = tokio::fs::File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut tail = VecDeque::with_capacity(n);
    while let Some(line) = read_line_lossy(&mut reader, &mut buf).await? {
        if tail.len() == n {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Ok(tail.into())
}

/// Whether the owner execute bit is set on `path`. `None` if it can't be read.
#[cfg(unix)]
pub async fn is_executable(path: &Path) -> Option<bool> {
    use std::os::unix::fs::PermissionsExt;
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some(meta.permissions().mode() & 0o100 != 0)
}

#[cfg(not(unix))]
pub async fn is_executable(path: &Path) -> Option<bool> {
    tokio::fs::metadata(path).await.ok().map(|m| m.is_file())
}

/// Log the engine-log tail and the executable's permissions after a
/// non-zero exit.
pub async fn report_failure(broker: &LogBroker, engine_log: &Path, engine_bin: &Path) {
    match tail_lines(engine_log, FAILURE_TAIL_LINES).await {
        Ok(lines) => {
            broker.error("Engine log, last lines:");
            for line in lines {
                broker.error(line.trim_end().to_string());
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            broker.error(format!("Engine log not found: {}", engine_log.display()));
        }
        Err(e) => {
            broker.error(format!("Could not read engine log: {e}"));
        }
    }

    match is_executable(engine_bin).await {
        Some(true) => {
            broker.error("Engine executable permissions: executable");
        }
        Some(false) => {
            broker.error("Engine executable permissions: not executable");
            broker.error(format!("Please run: chmod +x {}", engine_bin.display()));
        }
        None => {
            broker.error(format!("Engine executable not found: {}", engine_bin.display()));
        }
    }
}

/// Severity for a replayed engine-log line, or `None` to skip it.
pub fn replay_level(line: &str) -> Option<LogLevel> {
    if line.contains("ERROR") || line.contains("FATAL") {
        Some(LogLevel::Error)
    } else if line.contains("WARN") {
        Some(LogLevel::Warn)
    } else if REPLAY_KEYWORDS.iter().any(|k| line.contains(k)) {
        Some(LogLevel::Info)
    } else {
        None
    }
}

/// Replay the important lines of the engine log to the run log.
///
/// Only done at DEBUG threshold. Returns the number of lines replayed.
pub async fn replay_engine_log(broker: &LogBroker, engine_log: &Path) -> usize {
    if broker.threshold() != LogLevel::Debug {
        return 0;
    }
    let file = match tokio::fs::File::open(engine_log).await {
        Ok(file) => file,
        Err(e) => {
            broker.warn(format!("Could not read engine log: {e}"));
            return 0;
        }
    };

    broker.debug(format!(
        "===== Engine log contents ({}) =====",
        engine_log.display()
    ));
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut replayed = 0;
    loop {
        match read_line_lossy(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                let line = line.trim();
                if let Some(level) = replay_level(line) {
                    broker.log(level, format!("Engine log: {line}"));
                    replayed += 1;
                }
            }
            Ok(None) => break,
            Err(e) => {
                broker.warn(format!("Could not read engine log: {e}"));
                break;
            }
        }
    }
    broker.debug("===== End of engine log =====");
    replayed
}
