//! Socket binding and the HTTP runtime loop.

use anyhow::{Context, Result};
use axum::{routing::get, Extension, Router};
use demeter_stream::StreamConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{load_config, ServerConfig};
use crate::state::ServerState;

/// Port tried when none is configured
const DEFAULT_PORT: u16 = 9777;

/// Bind the listening socket.
///
/// An explicitly configured port is authoritative and a bind failure is
/// fatal. Without one, the default port is tried first and a busy port
/// falls back to an OS-assigned one.
async fn bind(config: &ServerConfig) -> Result<tokio::net::TcpListener> {
    if let Some(port) = config.port {
        let addr = format!("{}:{}", config.host, port);
        return tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr));
    }

    let addr = format!("{}:{}", config.host, DEFAULT_PORT);
    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            info!(
                port = DEFAULT_PORT,
                "Default port busy, falling back to an OS-assigned port"
            );
            let fallback = format!("{}:0", config.host);
            tokio::net::TcpListener::bind(&fallback)
                .await
                .with_context(|| format!("Failed to bind to {}", fallback))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to bind to {}", addr)),
    }
}

/// Build the application router backed by `state`.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Demeter Control Plane" }))
        .merge(crate::api::api_router())
        .merge(crate::websocket::websocket_router())
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}

/// Run a standalone server with configuration from files and environment.
///
/// `host` and `port` override the configured values when given. The server
/// starts without an orchestrator and reports not-ready until one is
/// attached through [`ServerState::attach`].
pub async fn run(host: Option<String>, port: Option<u16>) -> Result<()> {
    info!("Starting Demeter v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config().context("Failed to load configuration")?;
    info!("Configuration loaded");

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = Some(port);
    }

    let state = Arc::new(ServerState::new(
        StreamConfig {
            flush_interval_ms: config.stream.flush_interval_ms,
            max_batch_size: config.stream.max_batch_size,
        },
        config.stream.targets.clone(),
    ));
    info!(
        session_id = %state.session_id(),
        stream_targets = config.stream.targets.len(),
        "Session initialized"
    );

    serve(state, &config.server).await
}

/// Serve an already-constructed state until shutdown.
///
/// Embedding programs build the [`ServerState`] themselves, spawn this
/// future, and attach their orchestrator while the server runs.
pub async fn serve(state: Arc<ServerState>, config: &ServerConfig) -> Result<()> {
    let app = router(state.clone());

    let listener = bind(config).await?;
    let addr = listener
        .local_addr()
        .context("Failed to read local address")?;
    info!("HTTP server listening on http://{}", addr);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            info!("Shutdown signal received");
            shutdown.cancel();
        });
    }

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await
        .context("HTTP server error")?;

    info!("Flushing event stream...");
    state.close().await;

    info!("Demeter shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_explicit_port_conflict_is_fatal() {
        let holder = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken = holder.local_addr().unwrap().port();

        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: Some(taken),
        };
        assert!(bind(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_without_port_falls_back() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: None,
        };

        let first = bind(&config).await.unwrap();
        let second = bind(&config).await.unwrap();

        let first_port = first.local_addr().unwrap().port();
        let second_port = second.local_addr().unwrap().port();
        assert_ne!(first_port, 0);
        assert_ne!(second_port, 0);
        if first_port == DEFAULT_PORT {
            assert_ne!(second_port, DEFAULT_PORT);
        }
    }
}
