//! Demeter Core - Control Plane Model
//!
//! This crate provides the shared model for the Demeter runtime control
//! plane, including:
//! - Events: The closed event name set and emitted event values
//! - Log: Structured log-entry snapshots with revisions
//! - Event bus: Synchronous in-process publish/subscribe with handles
//! - Commands: Command descriptors and structured outcomes
//! - Orchestrator: The seam to the engine that executes commands

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod error;
pub mod event_bus;
pub mod events;
pub mod log;
pub mod orchestrator;

pub use command::{CommandError, CommandOutput, CommandSpec};
pub use error::{Error, Result};
pub use event_bus::{EventBus, EventSelector, LogBus, SubscriptionHandle};
pub use events::{Event, EventName, WorkflowRunRegistration};
pub use log::{LogEntry, LogLevel, LogMessage};
pub use orchestrator::Orchestrator;
