//! Engine output relay.
//!
//! Reads a captured output stream line by line until it closes and forwards
//! each line to the run log at a severity guessed from its text.
//!
//! Engine output is not guaranteed to be UTF-8; lines are decoded lossily so
//! a stray byte never stops the relay or closes the engine's pipe.

use loadctl_core::logging::LogLevel;
use loadctl_events::LogBroker;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};

/// Severity of an engine output line. First match wins.
pub fn classify_line(line: &str, threshold: LogLevel) -> LogLevel {
    if line.contains("ERROR") || line.contains("FATAL") {
        LogLevel::Error
    } else if line.contains("WARN") {
        LogLevel::Warn
    } else if line.contains("DEBUG") || line.contains("INFO") || threshold == LogLevel::Debug {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

/// Read one line into `buf` and decode it lossily, without its line
/// terminator. `None` at end of stream.
pub async fn read_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

/// Forward every non-blank line of `reader` to `broker` until end of stream.
///
/// Returns the number of lines forwarded. Read errors end the relay; they
/// are logged, not returned.
pub async fn relay_output<R>(reader: R, broker: &LogBroker) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        match read_line_lossy(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let level = classify_line(line, broker.threshold());
                broker.log(level, format!("Engine: {line}"));
                count += 1;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Engine output stream read failed");
                break;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_first_match_wins() {
        let t = LogLevel::Info;
        assert_eq!(classify_line("2024 ERROR something", t), LogLevel::Error);
        assert_eq!(classify_line("FATAL WARN mixed", t), LogLevel::Error);
        assert_eq!(classify_line("WARN disk low", t), LogLevel::Warn);
        assert_eq!(classify_line("INFO o.a.j.engine", t), LogLevel::Debug);
        assert_eq!(classify_line("DEBUG noise", t), LogLevel::Debug);
        assert_eq!(classify_line("summary = 100 in 10s", t), LogLevel::Info);
    }

    #[test]
    fn debug_threshold_demotes_plain_lines() {
        assert_eq!(
            classify_line("summary = 100 in 10s", LogLevel::Debug),
            LogLevel::Debug
        );
        assert_eq!(classify_line("WARN x", LogLevel::Debug), LogLevel::Warn);
    }

    #[tokio::test]
    async fn relays_lines_in_order_until_eof() {
        let broker = LogBroker::with_threshold(LogLevel::Info);
        let mut rx = broker.subscribe();
        let input: &[u8] = b"Creating summariser\n\nERROR boom\r\nINFO hidden\nWARN careful\n";

        let count = relay_output(input, &broker).await;

        assert_eq!(count, 4);
        let messages: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| (e.level, e.message))
            .collect();
        assert_eq!(
            messages,
            vec![
                (LogLevel::Info, "Engine: Creating summariser".to_string()),
                (LogLevel::Error, "Engine: ERROR boom".to_string()),
                (LogLevel::Warn, "Engine: WARN careful".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_stop_the_relay() {
        let broker = LogBroker::with_threshold(LogLevel::Info);
        let mut rx = broker.subscribe();
        let input: &[u8] = b"a\n\xff\nERROR b\n";

        let count = relay_output(input, &broker).await;

        assert_eq!(count, 3);
        let messages: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| (e.level, e.message))
            .collect();
        assert_eq!(messages[1], (LogLevel::Info, "Engine: \u{FFFD}".to_string()));
        assert_eq!(messages[2], (LogLevel::Error, "Engine: ERROR b".to_string()));
    }

    #[tokio::test]
    async fn lossy_lines_strip_terminators() {
        let mut input: &[u8] = b"caf\xe9 latin1\r\nlast";
        let mut buf = Vec::new();

        let first = read_line_lossy(&mut input, &mut buf).await.unwrap().unwrap();
        let second = read_line_lossy(&mut input, &mut buf).await.unwrap().unwrap();

        assert_eq!(first, "caf\u{FFFD} latin1");
        assert_eq!(second, "last");
        assert!(read_line_lossy(&mut input, &mut buf).await.unwrap().is_none());
    }
}
