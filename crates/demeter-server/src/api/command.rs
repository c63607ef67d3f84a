//! Command execution endpoint

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use demeter_core::{CommandSpec, Error};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::state::ServerState;

/// Execute a command against the attached orchestrator (POST)
///
/// Commands that ran but reported problems still come back as 200 with
/// the errors inside the output. 503 means no orchestrator is attached
/// yet; 500 means the orchestrator itself gave up.
async fn execute_command(
    Extension(state): Extension<Arc<ServerState>>,
    Json(spec): Json<CommandSpec>,
) -> impl IntoResponse {
    info!(command = %spec.command, "Received command request");

    match state.execute_command(spec).await {
        Ok(output) => (StatusCode::OK, Json(output)).into_response(),
        Err(Error::NotReady) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": Error::NotReady.to_string() })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Command execution failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Create command routes
pub fn command_routes() -> Router {
    Router::new().route("/api", post(execute_command))
}
