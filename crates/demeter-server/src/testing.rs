//! Shared test fixtures for server tests.

use std::sync::Arc;

use async_trait::async_trait;
use demeter_core::{
    CommandError, CommandOutput, CommandSpec, Error, EventBus, LogBus, Orchestrator, Result,
};
use demeter_stream::StreamConfig;
use serde_json::json;

use crate::state::ServerState;

/// Orchestrator double that echoes the command back in its result.
pub struct EchoOrchestrator {
    event_bus: Arc<EventBus>,
    log_bus: Arc<LogBus>,
    errors: Vec<CommandError>,
    fail: Option<String>,
}

impl EchoOrchestrator {
    pub fn new() -> Arc<Self> {
        Self::build(Vec::new(), None)
    }

    /// Succeeds but reports the given command errors in the output.
    pub fn with_errors(errors: Vec<CommandError>) -> Arc<Self> {
        Self::build(errors, None)
    }

    /// Fails every execution outright.
    pub fn failing(message: &str) -> Arc<Self> {
        Self::build(Vec::new(), Some(message.to_string()))
    }

    fn build(errors: Vec<CommandError>, fail: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            event_bus: Arc::new(EventBus::new()),
            log_bus: Arc::new(LogBus::new()),
            errors,
            fail,
        })
    }
}

#[async_trait]
impl Orchestrator for EchoOrchestrator {
    async fn execute(&self, spec: CommandSpec) -> Result<CommandOutput> {
        if let Some(message) = &self.fail {
            return Err(Error::Execution(message.clone()));
        }
        let result = json!({"command": spec.command, "parameters": spec.parameters});
        Ok(if self.errors.is_empty() {
            CommandOutput::ok(result)
        } else {
            CommandOutput::with_errors(result, self.errors.clone())
        })
    }

    fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    fn log_bus(&self) -> &Arc<LogBus> {
        &self.log_bus
    }

    fn project_id(&self) -> Option<String> {
        Some("proj-1".to_string())
    }

    fn environment(&self) -> String {
        "dev".to_string()
    }

    fn namespace(&self) -> String {
        "default".to_string()
    }
}

/// State with a flush interval long enough to never fire during a test.
pub fn test_state() -> Arc<ServerState> {
    Arc::new(ServerState::new(
        StreamConfig {
            flush_interval_ms: 60_000,
            max_batch_size: 100,
        },
        Vec::new(),
    ))
}
