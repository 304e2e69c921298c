//! # Event Publisher
//!
//! `EventPublisher` is the port producers depend on; `InMemoryEventBus` is
//! the broadcast-channel implementation shared by the whole process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::events::{EventFilter, EventTopic, PipelineEvent};
use crate::subscriber::{EventStream, Subscription, SubscriptionGuard};
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Publishing side of the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Returns how many receivers it was delivered to,
    /// before per-subscriber filtering.
    async fn publish(&self, event: PipelineEvent) -> usize;

    /// Events published so far, delivered or not.
    fn events_published(&self) -> u64;
}

/// Subscriber and publish counts per topic.
///
/// Filters without topics are booked under `EventTopic::All`.
#[derive(Debug, Default)]
pub(crate) struct TopicRegistry {
    subscribers: HashMap<EventTopic, usize>,
    published: HashMap<EventTopic, u64>,
}

impl TopicRegistry {
    pub(crate) fn attach(&mut self, topics: &[EventTopic]) {
        for topic in topics {
            *self.subscribers.entry(*topic).or_default() += 1;
        }
    }

    pub(crate) fn detach(&mut self, topics: &[EventTopic]) {
        for topic in topics {
            if let Some(count) = self.subscribers.get_mut(topic) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.subscribers.remove(topic);
                }
            }
        }
    }

    fn interested_in(&self, topic: EventTopic) -> usize {
        let direct = self.subscribers.get(&topic).copied().unwrap_or(0);
        if topic == EventTopic::All {
            return direct;
        }
        direct + self.subscribers.get(&EventTopic::All).copied().unwrap_or(0)
    }
}

/// Broadcast bus: every subscriber gets its own copy of every event and
/// filters on receive.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<PipelineEvent>,
    registry: Arc<Mutex<TopicRegistry>>,
    total_published: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Bus that buffers `capacity` events per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            registry: Arc::new(Mutex::new(TopicRegistry::default())),
            total_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching `filter`. Only events published after
    /// this call are delivered.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let topics = if filter.topics.is_empty() {
            vec![EventTopic::All]
        } else {
            filter.topics.clone()
        };

        self.registry.lock().attach(&topics);
        debug!(topics = ?topics, "Subscribed");

        let guard = SubscriptionGuard::new(Arc::clone(&self.registry), topics);
        Subscription::new(self.sender.subscribe(), filter, guard)
    }

    /// `subscribe(filter)` as a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        self.subscribe(filter).into_stream()
    }

    /// Live subscriptions whose filter admits `topic`.
    #[must_use]
    pub fn interested_in(&self, topic: EventTopic) -> usize {
        self.registry.lock().interested_in(topic)
    }

    /// Events published on `topic` so far.
    #[must_use]
    pub fn published_on(&self, topic: EventTopic) -> u64 {
        self.registry
            .lock()
            .published
            .get(&topic)
            .copied()
            .unwrap_or(0)
    }

    /// Live receivers of any kind.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: PipelineEvent) -> usize {
        let topic = event.topic();
        self.total_published.fetch_add(1, Ordering::Relaxed);

        let interested = {
            let mut registry = self.registry.lock();
            *registry.published.entry(topic).or_default() += 1;
            registry.interested_in(topic)
        };
        if interested == 0 {
            debug!(topic = ?topic, key = ?event.key(), "No subscriber for topic");
        }

        // Sending only fails when there are no receivers at all.
        let delivered = self.sender.send(event).unwrap_or(0);
        trace!(topic = ?topic, delivered, "Published");
        delivered
    }

    fn events_published(&self) -> u64 {
        self.total_published.load(Ordering::Relaxed)
    }
}
