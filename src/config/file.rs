//! Configuration file support for Inkpress
//!
//! This module provides TOML configuration file parsing and merging with CLI
//! arguments.
//!
//! ## Priority Order
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values
//!
//! ## Example Configuration
//!
//! ```toml
//! # inkpress.toml
//!
//! [server]
//! bind_addr = "127.0.0.1:8080"
//! log_level = "info"
//!
//! [storage]
//! db_path = "./data/inkpress.db"
//! in_memory = false
//!
//! [auth]
//! # jwt_secret = "change-me"
//! token_ttl_days = 7
//!
//! [bus]
//! topic_capacity = 1024
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ApiError, Result};

/// Root configuration structure for TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Gateway configuration
    pub server: ServerSection,

    /// Storage configuration
    pub storage: StorageSection,

    /// Token configuration
    pub auth: AuthSection,

    /// Topic bus configuration
    pub bus: BusSection,
}

/// Gateway section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Gateway listen address
    pub bind_addr: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,

    /// WebSocket keepalive timeout in seconds
    pub ws_keepalive_secs: Option<u64>,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: Option<u64>,

    /// Connection drain timeout in seconds
    pub drain_timeout: Option<u64>,
}

/// Storage section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// SQLite database path
    pub db_path: Option<PathBuf>,

    /// Run entirely in memory
    pub in_memory: Option<bool>,
}

/// Token section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Secret used to sign and verify bearer tokens
    pub jwt_secret: Option<String>,

    /// Bearer token lifetime in days
    pub token_ttl_days: Option<i64>,
}

/// Topic bus section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSection {
    /// Envelope buffer capacity per topic
    pub topic_capacity: Option<usize>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ApiError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            ApiError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Try to load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./inkpress.toml
    /// 2. /etc/inkpress/inkpress.toml
    /// 3. ~/.config/inkpress/inkpress.toml
    pub fn load_default() -> Option<Self> {
        let default_paths = [
            PathBuf::from("inkpress.toml"),
            PathBuf::from("/etc/inkpress/inkpress.toml"),
            dirs::config_dir()
                .map(|p| p.join("inkpress/inkpress.toml"))
                .unwrap_or_default(),
        ];

        for path in default_paths.iter().filter(|p| !p.as_os_str().is_empty()) {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {:?}", path);
                        return Some(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        None
    }

    /// Generate an example configuration file
    pub fn generate_example() -> String {
        r#"# Inkpress Configuration File
# Copy to inkpress.toml and customize as needed
#
# Configuration priority (highest to lowest):
# 1. Command-line arguments
# 2. Environment variables
# 3. This configuration file
# 4. Default values

[server]
# Gateway listen address (HTTP and WebSocket on one listener)
bind_addr = "127.0.0.1:8080"

# Log level (trace, debug, info, warn, error)
log_level = "info"

# Idle seconds before a silent WebSocket client is disconnected
ws_keepalive_secs = 30

# Graceful shutdown timeout in seconds
shutdown_timeout = 30

# Connection drain timeout in seconds
drain_timeout = 10

[storage]
# SQLite database path
db_path = "./data/inkpress.db"

# Run entirely in memory (no persistence)
# Useful for testing and development
in_memory = false

[auth]
# Secret used to sign and verify bearer tokens.
# The built-in development secret is used when unset - set this in production.
# jwt_secret = "change-me"

# Bearer token lifetime in days
token_ttl_days = 7

[bus]
# Envelope buffer capacity per topic.
# A subscriber that falls further behind than this loses its backlog.
topic_capacity = 1024
"#
        .to_string()
    }
}
