//! Configuration loading for the Demeter server.
//!
//! Settings come from an embedded default file, optional TOML files under
//! `config/`, and `DEMETER_*` environment variables, in that order.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use demeter_stream::StreamTarget;
use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Outbound event stream settings
    #[serde(default)]
    pub stream: StreamSection,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to listen on
    #[serde(default = "default_host")]
    pub host: String,
    /// Fixed port. When unset, the default port is tried with fallback
    /// to an OS-assigned one.
    #[serde(default)]
    pub port: Option<u16>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Stream delivery configuration (from [stream] in TOML)
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSection {
    /// Milliseconds between periodic flushes
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,
    /// Maximum items delivered per batch
    #[serde(default = "default_max_batch")]
    pub max_batch_size: usize,
    /// Ingestion endpoints to deliver batches to
    #[serde(default)]
    pub targets: Vec<StreamTarget>,
}

fn default_flush_interval() -> u64 {
    1000
}

fn default_max_batch() -> usize {
    100
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval(),
            max_batch_size: default_max_batch(),
            targets: Vec::new(),
        }
    }
}

/// Embedded default configuration (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("DEMETER_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        // 3. Environment variables (highest priority)
        // prefix_separator("_") ensures DEMETER_SERVER__HOST works (single _
        // after prefix). Without it, config-rs 0.14 defaults prefix_separator
        // to separator ("__"), requiring DEMETER__SERVER__HOST.
        .add_source(
            Environment::with_prefix("DEMETER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
