//! Command descriptors and results
//!
//! The server never interprets commands. It carries a descriptor to the
//! attached orchestrator and relays the structured outcome back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command request as received over HTTP or the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Command name, resolved by the orchestrator
    pub command: String,
    /// Command parameters, opaque to the server
    #[serde(default)]
    pub parameters: Value,
}

impl CommandSpec {
    /// Build a descriptor with the given parameters.
    pub fn new(command: impl Into<String>, parameters: Value) -> Self {
        Self {
            command: command.into(),
            parameters,
        }
    }
}

/// A structured error produced while executing a command.
///
/// These describe failures of the command itself (a build broke, a
/// deploy rolled back) and travel inside a successful response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandError {
    /// Human-readable description
    pub message: String,
    /// Extra context attached by the orchestrator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl CommandError {
    /// Build an error without detail.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }
}

/// The outcome of one command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Orchestrator-defined result value
    pub result: Value,
    /// Errors the command hit while still completing gracefully
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<CommandError>,
}

impl CommandOutput {
    /// A successful outcome with no errors.
    pub fn ok(result: Value) -> Self {
        Self {
            result,
            errors: Vec::new(),
        }
    }

    /// An outcome that completed but carries command-level errors.
    pub fn with_errors(result: Value, errors: Vec<CommandError>) -> Self {
        Self { result, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spec_defaults_parameters_to_null() {
        let spec: CommandSpec = serde_json::from_str("{\"command\":\"deploy\"}").unwrap();
        assert_eq!(spec.command, "deploy");
        assert!(spec.parameters.is_null());
    }

    #[test]
    fn test_output_omits_empty_errors() {
        let json = serde_json::to_string(&CommandOutput::ok(json!({"deployed": 3}))).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"errors\""));
    }

    #[test]
    fn test_output_carries_errors() {
        let output = CommandOutput::with_errors(
            json!(null),
            vec![CommandError::new("build failed for module api")],
        );
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("build failed for module api"));

        let parsed: CommandOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.errors.len(), 1);
    }
}
