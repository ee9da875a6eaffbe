//! Command-line arguments for the Inkpress server
//!
//! This module defines the CLI arguments structure using clap.

use clap::Parser;
use std::path::PathBuf;

use super::defaults::*;

/// Command-line arguments for the Inkpress server
#[derive(Parser, Debug, Clone)]
#[command(name = "inkpress")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A blog content API with live GraphQL subscriptions")]
pub struct ServerArgs {
    /// Path to configuration file (TOML format).
    /// If not specified, looks for inkpress.toml in the current directory,
    /// /etc/inkpress/, or ~/.config/inkpress/
    #[arg(short, long, env = "INKPRESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Generate example configuration file and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Address the gateway listens on for HTTP and WebSocket traffic
    #[arg(long, env = "INKPRESS_BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: String,

    /// SQLite database path
    #[arg(long, env = "INKPRESS_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// Run with an in-memory database - nothing is persisted
    #[arg(long, env = "INKPRESS_IN_MEMORY")]
    pub in_memory: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "INKPRESS_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Secret used to sign and verify bearer tokens.
    /// Falls back to a well-known development secret when unset.
    #[arg(long, env = "INKPRESS_JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Bearer token lifetime in days
    #[arg(long, env = "INKPRESS_TOKEN_TTL_DAYS", default_value_t = DEFAULT_TOKEN_TTL_DAYS)]
    pub token_ttl_days: i64,

    /// Envelope buffer capacity per bus topic.
    /// A subscriber that falls further behind than this loses its backlog.
    #[arg(long, env = "INKPRESS_TOPIC_CAPACITY", default_value_t = crate::pubsub::DEFAULT_TOPIC_CAPACITY)]
    pub topic_capacity: usize,

    /// Idle seconds before a silent WebSocket client is disconnected
    #[arg(long, env = "INKPRESS_WS_KEEPALIVE_SECS", default_value_t = DEFAULT_WS_KEEPALIVE_SECS)]
    pub ws_keepalive_secs: u64,

    /// Graceful shutdown timeout in seconds
    #[arg(long, env = "INKPRESS_SHUTDOWN_TIMEOUT", default_value_t = crate::server::shutdown::DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    pub shutdown_timeout: u64,

    /// Connection drain timeout in seconds during shutdown
    #[arg(long, env = "INKPRESS_DRAIN_TIMEOUT", default_value_t = crate::server::shutdown::DEFAULT_DRAIN_TIMEOUT_SECS)]
    pub drain_timeout: u64,
}
