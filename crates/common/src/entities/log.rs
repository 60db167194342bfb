use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
  Debug,
  Info,
  Warn,
  Error,
}

impl LogLevel {
  /// Best-effort classification of a raw container stdout/stderr line,
  /// used by the log pipeline when the container doesn't self-report a
  /// level. Mirrors the cheap substring sniffing production log shippers
  /// use rather than a real parser.
  pub fn classify(line: &str) -> LogLevel {
    let lower = line.to_lowercase();
    if lower.contains("error") || lower.contains("panic") {
      LogLevel::Error
    } else if lower.contains("warn") {
      LogLevel::Warn
    } else if lower.contains("debug") {
      LogLevel::Debug
    } else {
      LogLevel::Info
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
  pub timestamp: i64,
  pub level: LogLevel,
  pub message: String,
}

pub const LOG_CAP: usize = 1000;
pub const LOG_TTL_SECS: i64 = 24 * 60 * 60;
pub const LOG_REPLAY_COUNT: usize = 50;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_by_keyword_with_error_taking_priority() {
    assert_eq!(LogLevel::classify("thread panicked at src/main.rs"), LogLevel::Error);
    assert_eq!(LogLevel::classify("ERROR: connection refused"), LogLevel::Error);
    assert_eq!(LogLevel::classify("WARN: retrying request"), LogLevel::Warn);
    assert_eq!(LogLevel::classify("debug: entering scrape loop"), LogLevel::Debug);
    assert_eq!(LogLevel::classify("visited https://example.com"), LogLevel::Info);
  }

  #[test]
  fn classification_is_case_insensitive() {
    assert_eq!(LogLevel::classify("Error something broke"), LogLevel::Error);
  }
}
