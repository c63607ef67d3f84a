//! Inbound event batch endpoint
//!
//! Collaborating processes (workflow runs spawned by the orchestrator)
//! post event batches here. Accepted events are republished on the
//! inbound bus, which fans them out to socket clients.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use demeter_stream::{EventBatch, AUTH_TOKEN_HEADER};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::state::ServerState;

/// Ingest a batch of events from a collaborating process (POST)
///
/// The credential check runs before the body is parsed; a bad token gets
/// an empty 401 no matter what the payload looks like.
async fn ingest_events(
    Extension(state): Extension<Arc<ServerState>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let token = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if token != state.auth_secret() {
        warn!("Rejected event batch with invalid credential");
        return StatusCode::UNAUTHORIZED;
    }

    let batch: EventBatch = match serde_json::from_str(&body) {
        Ok(batch) => batch,
        Err(e) => {
            warn!(error = %e, "Rejected malformed event batch");
            return StatusCode::BAD_REQUEST;
        }
    };

    debug!(events = batch.events.len(), "Ingested event batch");
    for event in batch.events {
        state.publish_inbound(event);
    }
    StatusCode::OK
}

/// Create inbound event routes
pub fn events_routes() -> Router {
    Router::new().route("/events", post(ingest_events))
}
