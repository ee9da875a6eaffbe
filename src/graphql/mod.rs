//! GraphQL API module for Inkpress
//!
//! The content API: queries, mutations, and real-time subscriptions over
//! users, posts, and comments.
//!
//! # Architecture
//!
//! The schema is mounted on the gateway at `/graphql` (POST for queries and
//! mutations, GET for the playground) with WebSocket subscriptions at
//! `/graphql/ws`. Shared state (store, topic bus, token manager, and the
//! subscription router) is injected as schema data; the caller's
//! [`RequestAuth`] rides the per-request context so resolvers can resolve
//! identity lazily.
//!
//! # Example Queries
//!
//! ```graphql
//! # Published posts, newest first
//! query {
//!   posts(limit: 10) {
//!     id
//!     title
//!     author { name }
//!   }
//! }
//!
//! # Sign up and keep the token
//! mutation {
//!   createUser(data: { name: "Ada", email: "ada@example.com", password: "correcthorse" }) {
//!     token
//!     user { id name }
//!   }
//! }
//!
//! # Publish a post
//! mutation {
//!   createPost(data: { title: "Hello", body: "First!", published: true }) {
//!     id
//!     published
//!   }
//! }
//!
//! # Watch comments on a post (WebSocket)
//! subscription {
//!   comment(postId: "1") {
//!     mutation
//!     data { text author { name } }
//!   }
//! }
//! ```

pub mod mutation;
pub mod query;
pub mod subscription;
pub mod types;

use async_graphql::{Context, Schema};
use std::sync::Arc;

use crate::auth::{Identity, RequestAuth, TokenManager};
use crate::error::ApiError;
use crate::pubsub::router::SubscriptionRouter;
use crate::pubsub::TopicBus;
use crate::store::Database;

use self::mutation::MutationRoot;
use self::query::QueryRoot;
use self::subscription::SubscriptionRoot;

/// The full GraphQL schema type for Inkpress
pub type InkpressSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

/// Build the GraphQL schema with required shared state.
///
/// The schema is injected with:
/// - `Arc<Database>` for store operations
/// - `Arc<TopicBus>` for publishing mutation envelopes
/// - `Arc<TokenManager>` for issuing and verifying bearer tokens
/// - [`SubscriptionRouter`] for opening filtered subscription streams
pub fn build_schema(
    store: Arc<Database>,
    bus: Arc<TopicBus>,
    tokens: Arc<TokenManager>,
) -> InkpressSchema {
    let router = SubscriptionRouter::new(bus.clone(), store.clone());
    Schema::build(QueryRoot, MutationRoot, SubscriptionRoot)
        .data(store)
        .data(bus)
        .data(tokens)
        .data(router)
        .finish()
}

/// Resolve the caller's identity from the request context.
///
/// Anonymous callers resolve to `None` unless `require` is set; a presented
/// credential is verified either way, so a forged or expired token fails
/// even on operations that allow anonymous access. Behaves identically for
/// HTTP requests (bearer header) and WebSocket connections (identity fixed
/// at `connection_init`).
pub(crate) fn current_identity(
    ctx: &Context<'_>,
    require: bool,
) -> std::result::Result<Option<Identity>, ApiError> {
    let tokens = ctx
        .data::<Arc<TokenManager>>()
        .map_err(|_| ApiError::Server("token manager missing from schema context".to_string()))?;
    match ctx.data_opt::<RequestAuth>() {
        Some(auth) => auth.resolve(tokens, require),
        None => RequestAuth::Anonymous.resolve(tokens, require),
    }
}

/// Resolve the caller's identity, failing with `AuthenticationRequired` for
/// anonymous callers.
pub(crate) fn required_identity(ctx: &Context<'_>) -> std::result::Result<Identity, ApiError> {
    current_identity(ctx, true)?.ok_or(ApiError::AuthenticationRequired)
}
