//! Batch wire types
//!
//! One batch groups the items of a single delivery attempt together with
//! the correlation identifiers that tie them to a session, project, and
//! workflow run.

use demeter_core::{Event, LogEntry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation fields attached to every outgoing batch.
///
/// The session identifier is fixed for one server process; the workflow
/// run identifier changes when a registration control event arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    /// Identifier of the emitting server process
    pub session_id: Uuid,
    /// Current workflow run, when one has been registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_run_id: Option<String>,
    /// Project the orchestrator operates on, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Environment the orchestrator operates against
    pub environment: String,
    /// Namespace within the environment
    pub namespace: String,
}

/// A batch of events bound for a stream target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBatch {
    /// Buffered events, oldest first
    pub events: Vec<Event>,
    /// Correlation fields
    #[serde(flatten)]
    pub info: BatchInfo,
}

/// A batch of log entries bound for a stream target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryBatch {
    /// Buffered entries, oldest first
    pub entries: Vec<LogEntry>,
    /// Correlation fields
    #[serde(flatten)]
    pub info: BatchInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use demeter_core::{EventName, LogLevel};
    use serde_json::json;

    fn info() -> BatchInfo {
        BatchInfo {
            session_id: Uuid::new_v4(),
            workflow_run_id: None,
            project_id: Some("proj-1".to_string()),
            environment: "dev".to_string(),
            namespace: "default".to_string(),
        }
    }

    #[test]
    fn test_event_batch_flattens_correlation_fields() {
        let batch = EventBatch {
            events: vec![Event::new(EventName::TaskComplete, json!({"task": "build.api"}))],
            info: info(),
        };
        let json = serde_json::to_value(&batch).unwrap();
        assert!(json.get("sessionId").is_some());
        assert_eq!(json["projectId"], "proj-1");
        assert_eq!(json["environment"], "dev");
        assert!(json.get("workflowRunId").is_none());
        assert_eq!(json["events"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_log_entry_batch_round_trip() {
        let batch = LogEntryBatch {
            entries: vec![demeter_core::LogEntry::new(
                "deploy.api",
                LogLevel::Info,
                "deploying",
            )],
            info: BatchInfo {
                workflow_run_id: Some("run-7".to_string()),
                ..info()
            },
        };
        let json = serde_json::to_string(&batch).unwrap();
        assert!(json.contains("\"workflowRunId\":\"run-7\""));

        let parsed: LogEntryBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.info.namespace, "default");
    }
}
