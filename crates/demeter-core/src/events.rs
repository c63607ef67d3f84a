//! Event model for the control plane
//!
//! Events are named notifications emitted by the orchestrator while it
//! builds, deploys, and tests. The name set is closed; payload shape is
//! determined by the name and carried opaquely as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of event names the control plane understands.
///
/// Wire representation is camelCase, matching the socket and batch
/// protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventName {
    /// A command was accepted and started executing
    CommandStarted,
    /// A command finished successfully
    CommandCompleted,
    /// A command finished with an error
    CommandFailed,
    /// Build state for an action changed
    BuildStatus,
    /// Deploy state for an action changed
    DeployStatus,
    /// Test state for an action changed
    TestStatus,
    /// Run state for an action changed
    RunStatus,
    /// A task entered the execution queue
    TaskPending,
    /// A task began processing
    TaskProcessing,
    /// A task finished successfully
    TaskComplete,
    /// A task finished with an error
    TaskError,
    /// Control event carrying the workflow run identifier
    WorkflowRunRegistered,
}

impl EventName {
    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::CommandStarted => "commandStarted",
            EventName::CommandCompleted => "commandCompleted",
            EventName::CommandFailed => "commandFailed",
            EventName::BuildStatus => "buildStatus",
            EventName::DeployStatus => "deployStatus",
            EventName::TestStatus => "testStatus",
            EventName::RunStatus => "runStatus",
            EventName::TaskPending => "taskPending",
            EventName::TaskProcessing => "taskProcessing",
            EventName::TaskComplete => "taskComplete",
            EventName::TaskError => "taskError",
            EventName::WorkflowRunRegistered => "workflowRunRegistered",
        }
    }

    /// Control events update correlation state instead of being
    /// forwarded as telemetry.
    pub fn is_control(&self) -> bool {
        matches!(self, EventName::WorkflowRunRegistered)
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single emitted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Which event this is
    pub name: EventName,
    /// Payload, shaped per event name
    pub payload: Value,
    /// Emission time
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(name: EventName, payload: Value) -> Self {
        Self {
            name,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Payload of the [`EventName::WorkflowRunRegistered`] control event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunRegistration {
    /// Identifier correlating commands and events across one workflow run
    pub workflow_run_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_name_wire_format() {
        let json = serde_json::to_string(&EventName::TaskComplete).unwrap();
        assert_eq!(json, "\"taskComplete\"");

        let parsed: EventName = serde_json::from_str("\"deployStatus\"").unwrap();
        assert_eq!(parsed, EventName::DeployStatus);
    }

    #[test]
    fn test_event_name_as_str_matches_serde() {
        for name in [
            EventName::CommandStarted,
            EventName::BuildStatus,
            EventName::TaskError,
            EventName::WorkflowRunRegistered,
        ] {
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, format!("\"{}\"", name.as_str()));
        }
    }

    #[test]
    fn test_control_event_classification() {
        assert!(EventName::WorkflowRunRegistered.is_control());
        assert!(!EventName::TaskComplete.is_control());
        assert!(!EventName::CommandStarted.is_control());
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::new(
            EventName::DeployStatus,
            json!({"actionName": "api", "state": "ready"}),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"name\":\"deployStatus\""));
        assert!(json.contains("\"actionName\":\"api\""));
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn test_workflow_run_registration_payload() {
        let payload: WorkflowRunRegistration =
            serde_json::from_value(json!({"workflowRunId": "run-42"})).unwrap();
        assert_eq!(payload.workflow_run_id, "run-42");
    }
}
