//! Error types for demeter-core
//!
//! Every failure surfaced by the control plane maps onto one of these
//! variants; none of them terminate the server process.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// No orchestrator is attached yet
    #[error("server is not ready")]
    NotReady,

    /// Malformed or incomplete message on the socket
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Credential did not match the server secret
    #[error("authentication failed")]
    Auth,

    /// A telemetry batch could not be delivered to a target
    #[error("delivery to {target} failed: {reason}")]
    Delivery {
        /// Target host the batch was addressed to
        target: String,
        /// Transport or HTTP status failure description
        reason: String,
    },

    /// Command execution failed inside the orchestrator
    #[error("execution error: {0}")]
    Execution(String),

    /// Internal error (serialization, channel plumbing, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
