//! Batched delivery of orchestrator events and log entries to remote
//! collector targets.
//!
//! The server owns one [`BufferedEventStream`] per session. Connecting an
//! orchestrator wires listeners onto its buses, and a background task
//! periodically drains the buffers and posts them as JSON batches.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod stream;
pub mod target;

pub use batch::{BatchInfo, EventBatch, LogEntryBatch};
pub use stream::{BufferedEventStream, StreamConfig, AUTH_TOKEN_HEADER};
pub use target::StreamTarget;
