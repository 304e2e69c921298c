//! # Shared Bus
//!
//! In-process stand-in for the message transport. Producers publish keyed
//! events; every subscriber receives the events matching its filter in
//! publish order.
//!
//! ## Topics
//!
//! | Topic | Events | Producers | Consumers |
//! |-------|--------|-----------|-----------|
//! | `PageViews` | `PageViewed` | ap-01 source | ap-01 logger |
//! | `FileChunks` | `FileChunkReceived` | runtime, external producers | ap-02 |
//! | `Artifacts` | `ArtifactWritten`, `ReassemblyAborted` | ap-02 | operators, tests |
//! | `DeadLetterQueue` | `CriticalError` | any subsystem | runtime monitor |
//!
//! Subsystems never call each other directly; the bus is the only seam.
//!
//! ## Ordering and Loss
//!
//! All events for one key come from a single producer, so per-key order is
//! the publish order. A subscriber that falls more than the bus capacity
//! behind loses the oldest events and sees the gap counted in
//! `Subscription::lagged`.

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EventFilter, EventTopic, PipelineEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Events buffered per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
