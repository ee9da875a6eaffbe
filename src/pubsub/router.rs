//! Routing from bus topics to subscription streams.
//!
//! Every live subscription is the same machine: a topic subscription plus a
//! delivery filter, evaluated per envelope. Subscribe-time checks (does the
//! post exist, is there a caller identity) happen before the stream opens;
//! delivery-time checks run against each envelope so a subscriber only ever
//! sees events it is entitled to.

use futures_util::Stream;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::{ApiError, Result};
use crate::events::{topics, Event, Resource};
use crate::pubsub::TopicBus;
use crate::store::Database;

/// Per-envelope authorization applied between the bus and a subscriber.
#[derive(Debug, Clone)]
pub enum DeliveryFilter {
    /// Every envelope on the topic is delivered; the subscribe-time check
    /// was the only gate.
    EveryEnvelope,
    /// Post lifecycle: drafts are delivered only to their author. `None`
    /// is an anonymous subscriber, who sees published-post events only.
    VisibleTo(Option<i64>),
    /// Author stream: the envelope's post must still exist and still belong
    /// to this user at delivery time. Guards stale references delivered
    /// after the post was deleted out from under the stream.
    StillOwnedBy(i64),
}

impl DeliveryFilter {
    fn permits(&self, event: &Event, store: &Database) -> bool {
        match self {
            DeliveryFilter::EveryEnvelope => true,
            DeliveryFilter::VisibleTo(viewer) => match &event.resource {
                Resource::Post(post) => post.published || Some(post.author_id) == *viewer,
                Resource::Comment(_) => true,
            },
            DeliveryFilter::StillOwnedBy(owner) => match &event.resource {
                Resource::Post(post) => match store.post_by_id(post.id) {
                    Ok(Some(current)) => current.author_id == *owner,
                    Ok(None) => false,
                    Err(e) => {
                        warn!(post_id = post.id, error = %e, "Ownership re-check failed; dropping envelope");
                        false
                    }
                },
                Resource::Comment(_) => false,
            },
        }
    }
}

/// One subscription's wiring: where to listen and what to let through.
struct Route {
    topic: String,
    filter: DeliveryFilter,
}

/// Builds filtered event streams for the three subscription kinds.
#[derive(Clone)]
pub struct SubscriptionRouter {
    bus: Arc<TopicBus>,
    store: Arc<Database>,
}

impl SubscriptionRouter {
    pub fn new(bus: Arc<TopicBus>, store: Arc<Database>) -> Self {
        Self { bus, store }
    }

    /// Comment events for one post. Fails with NotFound if the post does
    /// not exist or is not visible to the caller; after that, every
    /// envelope on the post's comment topic passes through.
    pub async fn comments(
        &self,
        post_id: i64,
        viewer: Option<i64>,
    ) -> Result<impl Stream<Item = Event>> {
        let post = self
            .store
            .post_by_id(post_id)?
            .ok_or(ApiError::NotFound("Post"))?;
        if !post.published && Some(post.author_id) != viewer {
            return Err(ApiError::NotFound("Post"));
        }
        Ok(self
            .open(Route {
                topic: topics::post_comments(post_id),
                filter: DeliveryFilter::EveryEnvelope,
            })
            .await)
    }

    /// Global post lifecycle. Open to anonymous subscribers; the delivery
    /// filter hides draft events from everyone but their author. Identity
    /// is fixed at subscribe time.
    pub async fn posts(&self, viewer: Option<i64>) -> impl Stream<Item = Event> {
        self.open(Route {
            topic: topics::POSTS.to_string(),
            filter: DeliveryFilter::VisibleTo(viewer),
        })
        .await
    }

    /// The caller's own post events. Requires an identity; each envelope is
    /// re-checked against the store before delivery.
    pub async fn author_posts(&self, viewer: Option<i64>) -> Result<impl Stream<Item = Event>> {
        let owner = viewer.ok_or(ApiError::AuthenticationRequired)?;
        Ok(self
            .open(Route {
                topic: topics::author_posts(owner),
                filter: DeliveryFilter::StillOwnedBy(owner),
            })
            .await)
    }

    /// Register on the bus and wrap the receiver in the filter loop. The
    /// bus subscription is taken here, eagerly, so an envelope published
    /// right after this call is already owed to the new subscriber. A
    /// lagged receiver skips its lost backlog and keeps going; the stream
    /// ends when the bus side closes or the consumer drops it.
    async fn open(&self, route: Route) -> impl Stream<Item = Event> {
        let mut rx = self.bus.subscribe(&route.topic).await;
        let store = self.store.clone();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if route.filter.permits(&event, &store) {
                            yield event;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(topic = %route.topic, skipped, "Subscriber lagged; envelopes dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::store::Post;
    use futures_util::{pin_mut, StreamExt};
    use std::time::Duration;
    use tokio::time::timeout;

    fn fixtures() -> (Arc<Database>, Arc<TopicBus>, SubscriptionRouter) {
        let store = Arc::new(Database::open_in_memory().expect("store"));
        let bus = Arc::new(TopicBus::new());
        let router = SubscriptionRouter::new(bus.clone(), store.clone());
        (store, bus, router)
    }

    async fn next_event<S: Stream<Item = Event>>(stream: S) -> Option<Event> {
        pin_mut!(stream);
        timeout(Duration::from_millis(200), stream.next())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn post_stream_hides_drafts_from_strangers() {
        let (store, bus, router) = fixtures();
        let alice = store.create_user("alice", "a@example.com", "h").unwrap();
        let draft = store.create_post(alice.id, "Draft", "wip", false).unwrap();
        let public = store.create_post(alice.id, "Public", "out", true).unwrap();

        let anon = router.posts(None).await;
        pin_mut!(anon);
        let own = router.posts(Some(alice.id)).await;
        pin_mut!(own);

        bus.publish(topics::POSTS, Event::post(EventKind::Created, draft.clone()))
            .await;
        bus.publish(topics::POSTS, Event::post(EventKind::Created, public.clone()))
            .await;

        // The anonymous subscriber's first delivery is the published post;
        // the draft envelope was filtered out ahead of it.
        let event = timeout(Duration::from_millis(200), anon.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        match &event.resource {
            Resource::Post(p) => assert_eq!(p.id, public.id),
            _ => panic!("expected post"),
        }

        // The author sees both, in publish order.
        let first = timeout(Duration::from_millis(200), own.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        match &first.resource {
            Resource::Post(p) => assert_eq!(p.id, draft.id),
            _ => panic!("expected post"),
        }
    }

    #[tokio::test]
    async fn comment_stream_requires_visible_post() {
        let (store, bus, router) = fixtures();
        let alice = store.create_user("alice", "a@example.com", "h").unwrap();
        let bob = store.create_user("bob", "b@example.com", "h").unwrap();
        let draft = store.create_post(alice.id, "Draft", "wip", false).unwrap();

        let err = router.comments(4242, None).await.err().expect("missing post");
        assert!(matches!(err, ApiError::NotFound("Post")));

        let err = router
            .comments(draft.id, Some(bob.id))
            .await
            .err()
            .expect("invisible post");
        assert!(matches!(err, ApiError::NotFound("Post")));

        // The author can watch their own draft's comments.
        let stream = router
            .comments(draft.id, Some(alice.id))
            .await
            .expect("author stream");
        let comment = store
            .create_comment(alice.id, draft.id, "note to self")
            .unwrap();
        bus.publish(
            &topics::post_comments(draft.id),
            Event::comment(EventKind::Created, comment),
        )
        .await;
        let event = next_event(stream).await.expect("delivery");
        assert_eq!(event.kind, EventKind::Created);
    }

    #[tokio::test]
    async fn author_stream_requires_identity() {
        let (_store, _bus, router) = fixtures();
        let err = router.author_posts(None).await.err().expect("no identity");
        assert!(matches!(err, ApiError::AuthenticationRequired));
    }

    #[tokio::test]
    async fn author_stream_rechecks_ownership() {
        let (store, bus, router) = fixtures();
        let alice = store.create_user("alice", "a@example.com", "h").unwrap();
        let post = store.create_post(alice.id, "Mine", "body", true).unwrap();

        let stream = router.author_posts(Some(alice.id)).await.expect("stream");
        pin_mut!(stream);

        // Still owned: delivered.
        bus.publish(
            &topics::author_posts(alice.id),
            Event::post(EventKind::Created, post.clone()),
        )
        .await;
        let event = timeout(Duration::from_millis(200), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        assert_eq!(event.kind, EventKind::Created);

        // Deleted between publish and delivery: the stale envelope is
        // suppressed; a later live envelope still comes through.
        store.delete_post(post.id, alice.id).unwrap();
        bus.publish(
            &topics::author_posts(alice.id),
            Event::post(EventKind::Updated, post.clone()),
        )
        .await;
        let fresh = store.create_post(alice.id, "Next", "body", true).unwrap();
        bus.publish(
            &topics::author_posts(alice.id),
            Event::post(EventKind::Created, fresh.clone()),
        )
        .await;

        let event = timeout(Duration::from_millis(200), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        match &event.resource {
            Resource::Post(p) => assert_eq!(p.id, fresh.id),
            _ => panic!("expected post"),
        }
    }

    #[tokio::test]
    async fn dropping_one_stream_leaves_the_other_live() {
        let (_store, bus, router) = fixtures();
        let first = router.posts(None).await;
        let second = router.posts(None).await;
        pin_mut!(second);

        drop(first);
        let post = Post {
            id: 9,
            author_id: 1,
            title: "still flowing".into(),
            body: String::new(),
            published: true,
            created_at: 0,
            updated_at: 0,
        };
        bus.publish(topics::POSTS, Event::post(EventKind::Created, post))
            .await;

        let event = timeout(Duration::from_millis(200), second.next())
            .await
            .expect("timeout")
            .expect("stream ended");
        assert_eq!(event.kind, EventKind::Created);
    }
}
