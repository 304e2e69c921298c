//! # Event Subscriber
//!
//! A `Subscription` is one broadcast receiver plus a filter. It can be
//! polled directly (`recv`, `try_recv`) or turned into a `Stream`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::events::{EventFilter, EventTopic, PipelineEvent};
use crate::publisher::TopicRegistry;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Event bus closed")]
    Closed,
}

/// Removes a subscription's topics from the bus registry on drop.
pub(crate) struct SubscriptionGuard {
    registry: Arc<Mutex<TopicRegistry>>,
    topics: Vec<EventTopic>,
}

impl SubscriptionGuard {
    pub(crate) fn new(registry: Arc<Mutex<TopicRegistry>>, topics: Vec<EventTopic>) -> Self {
        Self { registry, topics }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.registry.lock().detach(&self.topics);
        debug!(topics = ?self.topics, "Unsubscribed");
    }
}

/// Filtered receiver for bus events.
pub struct Subscription {
    receiver: broadcast::Receiver<PipelineEvent>,
    filter: EventFilter,
    guard: SubscriptionGuard,
    lagged: u64,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<PipelineEvent>,
        filter: EventFilter,
        guard: SubscriptionGuard,
    ) -> Self {
        Self {
            receiver,
            filter,
            guard,
            lagged: 0,
        }
    }

    fn record_lag(&mut self, missed: u64) {
        self.lagged = self.lagged.saturating_add(missed);
        debug!(missed, topics = ?self.guard.topics, "Subscriber fell behind, events lost");
    }

    /// Wait for the next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => self.record_lag(missed),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<PipelineEvent>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Ok(Some(event)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(missed)) => self.record_lag(missed),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// Events lost so far by falling behind.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    #[must_use]
    pub fn into_stream(self) -> EventStream {
        EventStream {
            inner: BroadcastStream::new(self.receiver),
            filter: self.filter,
            _guard: self.guard,
        }
    }
}

/// `Stream` of matching events. Lag gaps are logged and skipped.
pub struct EventStream {
    inner: BroadcastStream<PipelineEvent>,
    filter: EventFilter,
    _guard: SubscriptionGuard,
}

impl EventStream {
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = PipelineEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let event = match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => event,
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(missed)))) => {
                    warn!(missed, "Event stream fell behind, events lost");
                    continue;
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            };
            if self.filter.matches(&event) {
                return Poll::Ready(Some(event));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::InMemoryEventBus;
    use crate::EventPublisher;
    use shared_types::entities::{FileChunkMessage, PageViewEvent};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    fn chunk_event(page: u32) -> PipelineEvent {
        PipelineEvent::FileChunkReceived {
            key: "report".to_string(),
            chunk: FileChunkMessage::new(page, 3, "AA=="),
        }
    }

    fn page_view_event() -> PipelineEvent {
        PipelineEvent::PageViewed {
            key: "Lucy".to_string(),
            event: PageViewEvent::new("Lucy", "login", 10),
        }
    }

    fn page_of(event: PipelineEvent) -> u32 {
        match event {
            PipelineEvent::FileChunkReceived { chunk, .. } => chunk.page,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_recv_skips_other_topics() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::FileChunks]));

        bus.publish(page_view_event()).await;
        bus.publish(chunk_event(1)).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page_of(received), 1);
    }

    #[tokio::test]
    async fn test_chunks_arrive_in_publish_order() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::FileChunks]));

        for page in 1..=3 {
            bus.publish(chunk_event(page)).await;
        }

        for expected in 1..=3 {
            assert_eq!(page_of(sub.try_recv().unwrap().unwrap()), expected);
        }
        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_lag_is_counted() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut sub = bus.subscribe(EventFilter::all());

        for page in 1..=3 {
            bus.publish(chunk_event(page)).await;
        }

        // Page 1 was overwritten before it was read.
        assert_eq!(page_of(sub.try_recv().unwrap().unwrap()), 2);
        assert_eq!(sub.lagged(), 1);
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_dropped() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe(EventFilter::all());
        drop(bus);

        assert_eq!(sub.recv().await.map(|e| e.topic()), None);
        assert!(matches!(sub.try_recv(), Err(SubscriptionError::Closed)));
    }

    #[tokio::test]
    async fn test_stream_keeps_subscription_registered() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.event_stream(EventFilter::topics(vec![EventTopic::PageViews]));
        assert_eq!(bus.interested_in(EventTopic::PageViews), 1);

        bus.publish(chunk_event(1)).await;
        bus.publish(page_view_event()).await;

        let received = timeout(Duration::from_millis(100), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(received, PipelineEvent::PageViewed { .. }));

        drop(stream);
        assert_eq!(bus.interested_in(EventTopic::PageViews), 0);
    }
}
