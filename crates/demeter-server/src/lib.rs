//! Demeter Server - Control Plane Runtime
//!
//! This crate provides the HTTP and WebSocket control plane for Demeter:
//! - Config: Layered configuration from files and environment
//! - State: Session identity, orchestrator attachment, connection registry
//! - Api: REST endpoints for commands, event ingestion, and health
//! - Websocket: Socket protocol and per-connection event relays
//! - Runtime: Socket binding and the serve loop
//!
//! A standalone server is started with [`run`]. Embedding programs build a
//! [`ServerState`], spawn [`serve`], and attach their orchestrator with
//! [`ServerState::attach`] once their workspace is loaded.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod runtime;
pub mod state;
pub mod websocket;

#[cfg(test)]
mod testing;

pub use config::{load_config, AppConfig, ServerConfig, StreamSection};
pub use runtime::{router, run, serve};
pub use state::ServerState;
