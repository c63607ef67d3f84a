//! WebSocket module for Demeter
//!
//! Provides the bidirectional socket endpoint:
//! - /ws - events out, command requests in

pub mod connection;
pub mod protocol;

pub use connection::socket_handler;

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new().route("/ws", get(socket_handler))
}
