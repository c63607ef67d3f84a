//! The orchestrator seam
//!
//! The engine that resolves commands into build/deploy work lives outside
//! this crate. The control plane sees it only through this trait: execute
//! a command, expose the buses it emits on, and describe the identifiers
//! used to correlate its telemetry.

use std::sync::Arc;

use async_trait::async_trait;

use crate::command::{CommandOutput, CommandSpec};
use crate::error::Result;
use crate::event_bus::{EventBus, LogBus};

/// An attached orchestrator instance.
///
/// At most one orchestrator is attached to a server at a time; attaching
/// a new one detaches the previous one's listeners first.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Execute a command and return its structured outcome.
    ///
    /// Command-level failures that complete gracefully come back as
    /// `Ok` with [`CommandOutput::errors`] populated; `Err` means the
    /// execution machinery itself failed.
    async fn execute(&self, spec: CommandSpec) -> Result<CommandOutput>;

    /// The bus this orchestrator emits events on.
    fn event_bus(&self) -> &Arc<EventBus>;

    /// The bus this orchestrator emits log entries on.
    fn log_bus(&self) -> &Arc<LogBus>;

    /// Project identifier for telemetry correlation, when known.
    fn project_id(&self) -> Option<String> {
        None
    }

    /// Environment this orchestrator operates against.
    fn environment(&self) -> String;

    /// Namespace within the environment.
    fn namespace(&self) -> String;
}
