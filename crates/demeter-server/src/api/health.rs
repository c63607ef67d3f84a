//! Health check endpoint

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;

use crate::state::ServerState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process is up
    pub status: &'static str,
    /// Server version
    pub version: &'static str,
    /// Whether an orchestrator is attached
    pub ready: bool,
}

/// Health check (for load balancers and probes)
///
/// `ready` flips once an orchestrator is attached; the endpoint itself
/// is always 200 while the process is up.
async fn health_check(Extension(state): Extension<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        ready: state.is_ready(),
    })
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}
