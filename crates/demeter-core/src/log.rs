//! Log entry model
//!
//! Log lines emitted by the process logger are forwarded as structured
//! entries. A line may be revised in place (progress spinners, status
//! updates); each emission is an immutable snapshot identified by `key`
//! plus a monotonically increasing `revision`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Unrecoverable or user-facing failure
    Error,
    /// Something suspicious, execution continues
    Warn,
    /// Normal progress output
    Info,
    /// Developer-facing detail
    Debug,
    /// Very chatty detail
    Trace,
}

/// Message body of a log entry: one line or an ordered group of lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogMessage {
    /// A single line
    Single(String),
    /// Several lines emitted together, in order
    Many(Vec<String>),
}

impl From<String> for LogMessage {
    fn from(value: String) -> Self {
        LogMessage::Single(value)
    }
}

impl From<&str> for LogMessage {
    fn from(value: &str) -> Self {
        LogMessage::Single(value.to_string())
    }
}

impl From<Vec<String>> for LogMessage {
    fn from(value: Vec<String>) -> Self {
        LogMessage::Many(value)
    }
}

/// One emission of a log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Stable identifier of the logical log line
    pub key: String,
    /// Logical parent line, if this line is nested under another
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<String>,
    /// Increases by one for every re-emission of the same `key`
    #[serde(default)]
    pub revision: u32,
    /// Line content
    pub message: LogMessage,
    /// Emission time
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: LogLevel,
    /// Structured data attached by the emitter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Display section the line belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl LogEntry {
    /// Create a first-revision entry stamped with the current time.
    pub fn new(key: impl Into<String>, level: LogLevel, message: impl Into<LogMessage>) -> Self {
        Self {
            key: key.into(),
            parent_key: None,
            revision: 0,
            message: message.into(),
            timestamp: Utc::now(),
            level,
            data: None,
            section: None,
            metadata: None,
        }
    }

    /// Snapshot the next revision of this line with a new message.
    pub fn revised(&self, message: impl Into<LogMessage>) -> Self {
        Self {
            revision: self.revision + 1,
            message: message.into(),
            timestamp: Utc::now(),
            ..self.clone()
        }
    }
}
