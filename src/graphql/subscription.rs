//! GraphQL subscription resolvers
//!
//! Real-time streams over the topic bus. Each resolver registers a bus
//! subscriber through the [`SubscriptionRouter`] before returning, so
//! envelopes published immediately after the subscribe call are already
//! owed to the stream, then maps raw envelopes into wire payloads.

use async_graphql::{Context, ErrorExtensions, Result, Subscription, ID};
use futures_util::{Stream, StreamExt};

use crate::graphql::current_identity;
use crate::graphql::types::{
    event_to_comment_payload, event_to_post_payload, parse_id, CommentEvent, PostEvent,
};
use crate::pubsub::router::SubscriptionRouter;

/// GraphQL Subscription root
pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Comments arriving on one post.
    ///
    /// Fails the subscribe call if the post does not exist or is a draft
    /// the caller cannot see; after that every envelope on the post's
    /// comment topic is delivered as-is.
    async fn comment(
        &self,
        ctx: &Context<'_>,
        post_id: ID,
    ) -> Result<impl Stream<Item = CommentEvent>> {
        let router = ctx.data::<SubscriptionRouter>()?.clone();
        let viewer = current_identity(ctx, false).map_err(|e| e.extend())?;
        let post_id = parse_id(&post_id, "Post").map_err(|e| e.extend())?;

        let stream = router
            .comments(post_id, viewer.map(|i| i.0))
            .await
            .map_err(|e| e.extend())?;
        tracing::debug!(post = post_id, "comment subscription started");
        Ok(stream.filter_map(|event| async move { event_to_comment_payload(event) }))
    }

    /// Global post lifecycle: CREATED, UPDATED, DELETED.
    ///
    /// Anonymous subscribers are allowed and observe only published-post
    /// events; an authenticated subscriber additionally observes events for
    /// their own posts. Identity is fixed at subscribe time.
    async fn post(&self, ctx: &Context<'_>) -> Result<impl Stream<Item = PostEvent>> {
        let router = ctx.data::<SubscriptionRouter>()?.clone();
        let viewer = current_identity(ctx, false).map_err(|e| e.extend())?;

        let stream = router.posts(viewer.map(|i| i.0)).await;
        Ok(stream.filter_map(|event| async move { event_to_post_payload(event) }))
    }

    /// Lifecycle of the caller's own posts. Requires identity; each
    /// envelope is re-checked against the store so events for posts that no
    /// longer belong to the caller are withheld.
    async fn my_post(&self, ctx: &Context<'_>) -> Result<impl Stream<Item = PostEvent>> {
        let router = ctx.data::<SubscriptionRouter>()?.clone();
        let viewer = current_identity(ctx, false).map_err(|e| e.extend())?;

        let stream = router
            .author_posts(viewer.map(|i| i.0))
            .await
            .map_err(|e| e.extend())?;
        Ok(stream.filter_map(|event| async move { event_to_post_payload(event) }))
    }
}
