//! Structured log line model
//!
//! A `LogLine` is one NDJSON record: severity, ISO-8601 timestamp and message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level token such as `warn`, `WARN` or `Warn:`
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim_end_matches(':');
        match token.to_ascii_uppercase().as_str() {
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// A single log record, serialized as one JSON object per line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Severity
    pub level: LogLevel,
    /// When the line was recorded
    pub timestamp: DateTime<Utc>,
    /// Message payload
    pub message: String,
}

impl LogLine {
    /// Create a new log line stamped with the current time
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    /// Serialize to a newline-terminated JSON record
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }
}

/// Parse a plain text line into a `LogLine`
///
/// Accepts `"LEVEL message"` or `"LEVEL: message"`. Lines without a leading
/// level token are recorded at `Info` with the whole line as the message.
pub fn parse_log_line(line: &str) -> Option<LogLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (level, message) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => match LogLevel::from_token(head) {
            Some(level) => (level, rest.trim()),
            None => (LogLevel::Info, line),
        },
        None => (LogLevel::Info, line),
    };

    Some(LogLine::new(level, message))
}
