//! Configuration module for Inkpress
//!
//! This module is organized into submodules for better maintainability:
//! - `defaults` - Default constants and values
//! - `args` - CLI argument definitions
//! - `file` - TOML configuration file loading
//! - `merge` - Config file and CLI argument merging

mod args;
mod defaults;
pub mod file;
mod merge;

// Re-export submodule types
pub use args::ServerArgs;
pub use defaults::*;
pub use file::ConfigFile;
pub use merge::merge_config_with_args;

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{ApiError, Result};

/// Complete server configuration for Inkpress.
///
/// `ServerConfig` contains all settings needed to run the content API,
/// covering the gateway listener, storage, token signing, and the topic bus.
///
/// # Configuration Sources
///
/// Configuration is loaded from multiple sources with this precedence:
/// 1. **CLI arguments** (highest priority)
/// 2. **Environment variables** - `INKPRESS_*` prefix
/// 3. **Config file** - TOML configuration file
/// 4. **Built-in defaults** (lowest priority)
///
/// # Example
///
/// ```rust,ignore
/// use inkpress::config::{ServerArgs, ServerConfig};
///
/// let args = ServerArgs::parse();
/// let config = ServerConfig::from_args(args)?;
/// config.validate()?;
/// ```
///
/// # Generating Example Config
///
/// ```bash
/// inkpress --generate-config > inkpress.toml
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the gateway listens on for HTTP and WebSocket traffic
    pub bind_addr: SocketAddr,

    /// Log level
    pub log_level: String,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Token signing configuration
    pub auth: AuthConfig,

    /// Envelope buffer capacity per topic
    pub topic_capacity: usize,

    /// Idle seconds before a silent WebSocket client is disconnected
    pub ws_keepalive_secs: u64,

    /// Shutdown configuration
    pub shutdown: crate::server::shutdown::ShutdownConfig,
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// SQLite database path
    pub db_path: PathBuf,

    /// Run entirely in memory (no persistence)
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            in_memory: DEFAULT_IN_MEMORY,
        }
    }
}

/// Token signing configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret used to sign and verify bearer tokens
    pub jwt_secret: String,

    /// Bearer token lifetime in days
    pub token_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration from command-line arguments
    pub fn from_args(args: ServerArgs) -> Result<Self> {
        let bind_addr: SocketAddr = args
            .bind_addr
            .parse()
            .map_err(|e| ApiError::Config(format!("Invalid bind address: {}", e)))?;

        Ok(Self {
            bind_addr,
            log_level: args.log_level,
            storage: StorageConfig {
                db_path: args.db_path,
                in_memory: args.in_memory,
            },
            auth: AuthConfig {
                jwt_secret: args
                    .jwt_secret
                    .unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
                token_ttl_days: args.token_ttl_days,
            },
            topic_capacity: args.topic_capacity,
            ws_keepalive_secs: args.ws_keepalive_secs,
            shutdown: crate::server::shutdown::ShutdownConfig {
                timeout_secs: args.shutdown_timeout,
                drain_timeout_secs: args.drain_timeout,
            },
        })
    }

    /// Validate the configuration for consistency and correctness
    ///
    /// Call this after loading configuration to catch issues at startup
    /// instead of at first use.
    pub fn validate(&self) -> Result<()> {
        use tracing::warn;

        if self.bind_addr.port() == 0 {
            return Err(ApiError::Config(
                "Gateway listen port must be between 1 and 65535".to_string(),
            ));
        }

        if self.auth.token_ttl_days < 1 {
            return Err(ApiError::Config(
                "Token lifetime must be at least one day".to_string(),
            ));
        }

        if self.topic_capacity == 0 {
            return Err(ApiError::Config(
                "Topic capacity must be at least 1".to_string(),
            ));
        }

        if self.ws_keepalive_secs == 0 {
            return Err(ApiError::Config(
                "WebSocket keepalive must be at least 1 second".to_string(),
            ));
        }

        if self.auth.jwt_secret == DEV_JWT_SECRET {
            warn!("SECURITY WARNING: running with the built-in development token secret");
            warn!(
                "Anyone who knows this secret can mint valid bearer tokens. \
                 Set --jwt-secret or INKPRESS_JWT_SECRET before exposing this server."
            );
        }

        if self.storage.in_memory {
            warn!("Storage is in-memory mode - data is not durable across restarts");
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_SOCKET_ADDR,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            topic_capacity: crate::pubsub::DEFAULT_TOPIC_CAPACITY,
            ws_keepalive_secs: DEFAULT_WS_KEEPALIVE_SECS,
            shutdown: crate::server::shutdown::ShutdownConfig::default(),
        }
    }
}
