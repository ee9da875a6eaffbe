//! Default constants for Inkpress configuration
//!
//! These constants define the default values used throughout the
//! configuration system when no explicit value is provided.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default gateway listen address (HTTP and WebSocket on one listener)
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Default gateway socket address (const, no parsing needed)
pub(crate) const DEFAULT_BIND_SOCKET_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);

/// Default SQLite database path
pub const DEFAULT_DB_PATH: &str = "./data/inkpress.db";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default in-memory mode
pub const DEFAULT_IN_MEMORY: bool = false;

/// Default page size for collection queries
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Hard cap on collection page size; larger requests are clamped
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default bearer token lifetime in days
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;

/// Built-in token signing secret for development.
///
/// Anyone who knows this string can mint valid tokens, so production
/// deployments must set their own secret.
pub const DEV_JWT_SECRET: &str = "inkpress-dev-secret-do-not-deploy";

/// Default WebSocket keepalive timeout in seconds
pub const DEFAULT_WS_KEEPALIVE_SECS: u64 = 30;
