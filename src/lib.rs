#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Inkpress
//!
//! Inkpress is a blog content API that serves GraphQL queries, mutations, and
//! live subscriptions from a single binary with an embedded SQLite store.
//!
//! ## Features
//!
//! - **One listener, two transports**: HTTP POST and graphql-ws share a port
//! - **Live subscriptions**: post and comment events pushed as they happen
//! - **Draft privacy**: unpublished posts are visible only to their authors,
//!   on queries and on event streams alike
//! - **Bearer-token auth**: signed tokens, salted password hashes
//! - **Zero configuration**: `./inkpress` works out of the box
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with defaults (listens on 127.0.0.1:8080)
//! $ ./inkpress
//!
//! # Run with custom settings
//! $ ./inkpress --bind-addr 0.0.0.0:8080 --db-path /var/lib/inkpress/blog.db
//!
//! # Run without persistence (development and tests)
//! $ ./inkpress --in-memory
//! ```
//!
//! Then open <http://127.0.0.1:8080/graphql> for the playground.
//!
//! ## Architecture
//!
//! Inkpress is organized into several modules:
//!
//! - [`server`]: gateway listener, routing, and graceful shutdown
//! - [`graphql`]: schema roots for queries, mutations, and subscriptions
//! - [`store`]: SQLite-backed content store
//! - [`pubsub`]: in-process topic bus feeding subscriptions
//! - [`events`]: envelopes published when writes commit
//! - [`auth`]: token issue/verify and password hashing
//! - [`config`]: server configuration and CLI arguments
//! - [`error`]: error types and Result alias
//!
//! ## Configuration
//!
//! Key configuration options (via CLI args or environment variables):
//!
//! | Option | Env Variable | Default | Description |
//! |--------|--------------|---------|-------------|
//! | `--bind-addr` | `INKPRESS_BIND_ADDR` | `127.0.0.1:8080` | Gateway address |
//! | `--db-path` | `INKPRESS_DB_PATH` | `./data/inkpress.db` | SQLite database path |
//! | `--in-memory` | `INKPRESS_IN_MEMORY` | `false` | Skip persistence |
//! | `--jwt-secret` | `INKPRESS_JWT_SECRET` | dev secret | Token signing secret |
//!
//! See [`ServerArgs`] for the complete list of options.

// Deny .unwrap() in production code to prevent panics while serving requests.
// Test code is exempt via #[cfg(test)] and --cfg test.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod graphql;
pub mod pubsub;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use auth::TokenManager;
pub use config::{ServerArgs, ServerConfig};
pub use error::{ApiError, Result};
pub use graphql::{build_schema, InkpressSchema};
pub use pubsub::TopicBus;
pub use server::Server;
pub use store::Database;
