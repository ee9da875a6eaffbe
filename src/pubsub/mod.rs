//! In-process topic bus connecting mutations to live subscriptions
//!
//! Mutations publish content-change envelopes to named topics; subscription
//! streams receive them. Delivery is fire-and-forget: envelopes are only
//! seen by subscribers registered at publish time and are never persisted
//! or replayed.
//!
//! Topics are identified by exact string match (no wildcards) and come into
//! existence on demand, from either side: subscribing to a topic nobody has
//! published to yet is the normal case, and publishing to a topic with no
//! subscribers is a silent no-op.
//!
//! Each topic is a bounded broadcast channel. A subscriber that falls
//! behind loses its own backlog; it never blocks the publisher or other
//! subscribers.

pub mod router;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::events::Event;

/// Default envelope buffer per topic.
pub const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// Statistics for a single bus topic.
#[derive(Debug, Clone)]
pub struct TopicStats {
    /// Topic name
    pub name: String,
    /// Number of active subscribers
    pub subscribers: usize,
    /// Total envelopes published to this topic
    pub events_published: u64,
}

/// Topic state: the broadcast sender plus counters.
struct TopicState {
    sender: broadcast::Sender<Event>,
    events_published: AtomicU64,
}

impl TopicState {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            events_published: AtomicU64::new(0),
        }
    }

    fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Configuration for the topic bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Maximum number of envelopes buffered per topic before slow
    /// subscribers start losing their backlog.
    pub topic_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            topic_capacity: DEFAULT_TOPIC_CAPACITY,
        }
    }
}

/// Topic-keyed publish/subscribe fabric.
pub struct TopicBus {
    /// Topics by name
    topics: Arc<RwLock<HashMap<String, Arc<TopicState>>>>,
    config: BusConfig,
    /// Total envelopes published across all topics
    total_events: AtomicU64,
    /// Total subscriptions created over the bus's lifetime
    total_subscriptions: AtomicU64,
}

impl TopicBus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            config,
            total_events: AtomicU64::new(0),
            total_subscriptions: AtomicU64::new(0),
        }
    }

    /// Subscribe to a topic, creating it if this is the first interest.
    ///
    /// The returned receiver observes every envelope published after this
    /// call, in publish order; nothing published earlier is replayed.
    /// Dropping the receiver deregisters the subscriber.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<Event> {
        {
            let topics = self.topics.read().await;
            if let Some(state) = topics.get(topic) {
                self.total_subscriptions.fetch_add(1, Ordering::Relaxed);
                debug!(topic, "Subscriber added to existing topic");
                return state.sender.subscribe();
            }
        }

        let mut topics = self.topics.write().await;
        // Re-check under the write lock: another task may have created it.
        let state = topics
            .entry(topic.to_string())
            .or_insert_with(|| {
                info!(topic, "Created bus topic");
                Arc::new(TopicState::new(self.config.topic_capacity))
            })
            .clone();
        self.total_subscriptions.fetch_add(1, Ordering::Relaxed);
        debug!(topic, "Subscriber added to topic");
        state.sender.subscribe()
    }

    /// Publish an envelope to a topic. Fire-and-forget: returns how many
    /// subscribers received it, with 0 meaning the envelope went nowhere.
    pub async fn publish(&self, topic: &str, event: Event) -> usize {
        let state = {
            let topics = self.topics.read().await;
            topics.get(topic).cloned()
        };
        let state = match state {
            Some(state) => state,
            None => {
                let mut topics = self.topics.write().await;
                topics
                    .entry(topic.to_string())
                    .or_insert_with(|| {
                        info!(topic, "Created bus topic on publish");
                        Arc::new(TopicState::new(self.config.topic_capacity))
                    })
                    .clone()
            }
        };

        let count = state.sender.send(event).unwrap_or(0);
        state.events_published.fetch_add(1, Ordering::Relaxed);
        self.total_events.fetch_add(1, Ordering::Relaxed);
        debug!(topic, subscribers = count, "Published envelope");
        count
    }

    /// Number of live subscribers on a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.read().await;
        topics
            .get(topic)
            .map(|s| s.subscriber_count())
            .unwrap_or(0)
    }

    /// Names of all currently known topics.
    pub async fn topic_names(&self) -> Vec<String> {
        let topics = self.topics.read().await;
        topics.keys().cloned().collect()
    }

    /// Statistics for one topic, if it exists.
    pub async fn topic_stats(&self, topic: &str) -> Option<TopicStats> {
        let topics = self.topics.read().await;
        topics.get(topic).map(|state| TopicStats {
            name: topic.to_string(),
            subscribers: state.subscriber_count(),
            events_published: state.events_published.load(Ordering::Relaxed),
        })
    }

    /// Aggregate statistics across the bus.
    pub async fn stats(&self) -> BusStats {
        let topics = self.topics.read().await;
        let topic_stats: Vec<TopicStats> = topics
            .iter()
            .map(|(name, state)| TopicStats {
                name: name.clone(),
                subscribers: state.subscriber_count(),
                events_published: state.events_published.load(Ordering::Relaxed),
            })
            .collect();
        let total_subscribers = topic_stats.iter().map(|s| s.subscribers).sum();

        BusStats {
            total_topics: topics.len(),
            total_subscribers,
            total_events: self.total_events.load(Ordering::Relaxed),
            total_subscriptions: self.total_subscriptions.load(Ordering::Relaxed),
            topics: topic_stats,
        }
    }

    /// Drop topics with no subscribers. Per-resource topics accumulate as
    /// content comes and goes; the gateway runs this on an interval.
    pub async fn cleanup_empty_topics(&self) -> usize {
        let mut topics = self.topics.write().await;
        let before = topics.len();
        topics.retain(|name, state| {
            let keep = state.subscriber_count() > 0;
            if !keep {
                debug!(topic = %name, "Dropped idle topic");
            }
            keep
        });
        let removed = before - topics.len();
        if removed > 0 {
            info!(removed, "Cleaned up idle bus topics");
        }
        removed
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Bus-wide statistics.
#[derive(Debug, Clone)]
pub struct BusStats {
    pub total_topics: usize,
    pub total_subscribers: usize,
    pub total_events: u64,
    /// Subscriptions created over the lifetime (may exceed current count)
    pub total_subscriptions: u64,
    pub topics: Vec<TopicStats>,
}
