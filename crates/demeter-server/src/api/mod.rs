//! Web API module for Demeter
//!
//! Provides HTTP endpoints for:
//! - Command execution against the attached orchestrator
//! - Inbound event batches from collaborating processes
//! - Health checks

pub mod command;
pub mod events;
pub mod health;

use axum::Router;

pub use command::command_routes;
pub use events::events_routes;
pub use health::health_routes;

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(command_routes())
        .merge(events_routes())
        .merge(health_routes())
}
