//! Socket protocol types
//!
//! JSON frames exchanged with socket clients. Server frames are tagged
//! by `type`. Client requests go through staged validation so that error
//! replies carry the request id whenever one could actually be read.

use demeter_core::{CommandError, CommandOutput, CommandSpec, Event};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Frames sent to socket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// An orchestrator or relayed event
    Event { name: String, payload: Value },
    /// Result of a command request
    CommandResult {
        request_id: Uuid,
        result: Value,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<CommandError>,
    },
    /// A rejected or failed request
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<Uuid>,
        message: String,
    },
}

impl ServerMessage {
    /// Frame relaying an event to the client.
    pub fn event(event: &Event) -> Self {
        Self::Event {
            name: event.name.to_string(),
            payload: event.payload.clone(),
        }
    }

    /// Frame answering a command request.
    pub fn command_result(request_id: Uuid, output: CommandOutput) -> Self {
        Self::CommandResult {
            request_id,
            result: output.result,
            errors: output.errors,
        }
    }

    /// Frame reporting a rejected or failed request.
    pub fn error(request_id: Option<Uuid>, message: impl Into<String>) -> Self {
        Self::Error {
            request_id,
            message: message.into(),
        }
    }
}

/// A validated client request.
#[derive(Debug)]
pub enum ParsedRequest {
    /// Execute a command against the orchestrator
    Command { id: Uuid, spec: CommandSpec },
}

/// A rejected client request.
#[derive(Debug)]
pub struct RequestError {
    /// Present when the frame carried a readable id
    pub request_id: Option<Uuid>,
    /// What was wrong with the frame
    pub message: String,
}

impl RequestError {
    fn anonymous(message: impl Into<String>) -> Self {
        Self {
            request_id: None,
            message: message.into(),
        }
    }

    fn for_request(id: Uuid, message: impl Into<String>) -> Self {
        Self {
            request_id: Some(id),
            message: message.into(),
        }
    }
}

/// Validate one client frame.
///
/// Validation is staged: first the JSON itself, then the id, then the
/// type, then type-specific fields. An error found before the id could
/// be read cannot be correlated, so `request_id` stays empty for it.
pub fn parse_request(text: &str) -> Result<ParsedRequest, RequestError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| RequestError::anonymous(format!("invalid JSON: {}", e)))?;

    let id = match value.get("id").and_then(Value::as_str) {
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => id,
            Err(_) => return Err(RequestError::anonymous("invalid request id")),
        },
        None => return Err(RequestError::anonymous("missing request id")),
    };

    let kind = match value.get("type").and_then(Value::as_str) {
        Some(kind) => kind,
        None => return Err(RequestError::for_request(id, "missing request type")),
    };

    match kind {
        "command" => {
            let command = match value.get("command").and_then(Value::as_str) {
                Some(command) if !command.is_empty() => command.to_string(),
                _ => return Err(RequestError::for_request(id, "missing command name")),
            };
            let parameters = value.get("parameters").cloned().unwrap_or(Value::Null);
            Ok(ParsedRequest::Command {
                id,
                spec: CommandSpec::new(command, parameters),
            })
        }
        _ => Err(RequestError::for_request(id, "unsupported request type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unparsable_frame_has_no_request_id() {
        let err = parse_request("{ not json").unwrap_err();
        assert!(err.request_id.is_none());
        assert!(err.message.contains("invalid JSON"));
    }

    #[test]
    fn test_missing_id_has_no_request_id() {
        let err = parse_request(r#"{"type": "command", "command": "build"}"#).unwrap_err();
        assert!(err.request_id.is_none());
        assert_eq!(err.message, "missing request id");
    }

    #[test]
    fn test_invalid_uuid_has_no_request_id() {
        let err = parse_request(r#"{"id": "not-a-uuid", "type": "command", "command": "build"}"#)
            .unwrap_err();
        assert!(err.request_id.is_none());
        assert_eq!(err.message, "invalid request id");
    }

    #[test]
    fn test_missing_type_keeps_request_id() {
        let id = Uuid::new_v4();
        let frame = json!({"id": id.to_string(), "command": "build"}).to_string();
        let err = parse_request(&frame).unwrap_err();
        assert_eq!(err.request_id, Some(id));
        assert_eq!(err.message, "missing request type");
    }

    #[test]
    fn test_unsupported_type_keeps_request_id() {
        let id = Uuid::new_v4();
        let frame = json!({"id": id.to_string(), "type": "subscribe"}).to_string();
        let err = parse_request(&frame).unwrap_err();
        assert_eq!(err.request_id, Some(id));
        assert_eq!(err.message, "unsupported request type");
    }

    #[test]
    fn test_command_without_name_keeps_request_id() {
        let id = Uuid::new_v4();
        let frame = json!({"id": id.to_string(), "type": "command"}).to_string();
        let err = parse_request(&frame).unwrap_err();
        assert_eq!(err.request_id, Some(id));
        assert_eq!(err.message, "missing command name");
    }

    #[test]
    fn test_valid_command_parses() {
        let id = Uuid::new_v4();
        let frame = json!({
            "id": id.to_string(),
            "type": "command",
            "command": "deploy",
            "parameters": {"environment": "dev"},
        })
        .to_string();

        let ParsedRequest::Command { id: parsed, spec } = parse_request(&frame).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(spec.command, "deploy");
        assert_eq!(spec.parameters["environment"], "dev");
    }

    #[test]
    fn test_command_parameters_default_to_null() {
        let id = Uuid::new_v4();
        let frame = json!({
            "id": id.to_string(),
            "type": "command",
            "command": "status",
        })
        .to_string();

        let ParsedRequest::Command { spec, .. } = parse_request(&frame).unwrap();
        assert!(spec.parameters.is_null());
    }

    #[test]
    fn test_server_message_wire_format() {
        let id = Uuid::new_v4();
        let message =
            ServerMessage::command_result(id, CommandOutput::ok(json!({"built": true})));
        let wire: Value = serde_json::to_value(&message).unwrap();
        assert_eq!(wire["type"], "commandResult");
        assert_eq!(wire["requestId"], id.to_string());
        assert_eq!(wire["result"]["built"], true);
        assert!(wire.get("errors").is_none());
    }

    #[test]
    fn test_error_message_omits_absent_request_id() {
        let wire: Value = serde_json::to_value(ServerMessage::error(None, "invalid JSON")).unwrap();
        assert_eq!(wire["type"], "error");
        assert!(wire.get("requestId").is_none());
        assert_eq!(wire["message"], "invalid JSON");
    }

    #[test]
    fn test_event_message_wire_format() {
        let event = Event::new(demeter_core::EventName::BuildStatus, json!({"pct": 40}));
        let wire: Value = serde_json::to_value(ServerMessage::event(&event)).unwrap();
        assert_eq!(wire["type"], "event");
        assert_eq!(wire["name"], "buildStatus");
        assert_eq!(wire["payload"]["pct"], 40);
    }
}
