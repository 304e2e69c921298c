//! Bus event envelope, topics and subscription filters.
//!
//! Payload structs live in `shared-types`; this module only says which topic
//! each one travels on and who produced it.

use serde::{Deserialize, Serialize};
use shared_types::entities::{ArtifactDescriptor, FileChunkMessage, PageViewEvent, SubsystemId};

/// Everything that travels on the bus.
///
/// Keyed events carry their message key next to the payload. All events for
/// one key are published by a single producer, so a subscriber observes them
/// in publish order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// ap-01 source → ap-01 logger. Keyed by user id.
    PageViewed { key: String, event: PageViewEvent },

    /// Producer → ap-02. Keyed by file identifier.
    FileChunkReceived { key: String, chunk: FileChunkMessage },

    /// ap-02, after the sink accepted the bytes.
    ArtifactWritten(ArtifactDescriptor),

    /// ap-02 threw away a key's partial file.
    ReassemblyAborted { key: String, reason: String },

    /// Needs an operator; routed to the dead-letter topic.
    CriticalError {
        subsystem: SubsystemId,
        error: String,
    },
}

impl PipelineEvent {
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::PageViewed { .. } => EventTopic::PageViews,
            Self::FileChunkReceived { .. } => EventTopic::FileChunks,
            Self::ArtifactWritten(_) | Self::ReassemblyAborted { .. } => EventTopic::Artifacts,
            Self::CriticalError { .. } => EventTopic::DeadLetterQueue,
        }
    }

    /// Chunks count as runtime-originated; nothing inside the pipeline
    /// produces them except `PipelineRuntime::publish_file`.
    #[must_use]
    pub fn source_subsystem(&self) -> SubsystemId {
        match self {
            Self::PageViewed { .. } => SubsystemId::PageViews,
            Self::FileChunkReceived { .. } => SubsystemId::Runtime,
            Self::ArtifactWritten(_) | Self::ReassemblyAborted { .. } => {
                SubsystemId::ChunkReassembly
            }
            Self::CriticalError { subsystem, .. } => *subsystem,
        }
    }

    /// `None` only for dead-letter events.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::PageViewed { key, .. }
            | Self::FileChunkReceived { key, .. }
            | Self::ReassemblyAborted { key, .. } => Some(key),
            Self::ArtifactWritten(descriptor) => Some(&descriptor.key),
            Self::CriticalError { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// `pvin` / `pvout`.
    PageViews,
    FileChunks,
    /// Written and aborted files.
    Artifacts,
    DeadLetterQueue,
    /// Wildcard, only meaningful inside a filter.
    All,
}

/// Topic and source allow-lists. An empty list allows everything; an event
/// must pass both lists.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub topics: Vec<EventTopic>,
    pub source_subsystems: Vec<SubsystemId>,
}

impl EventFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            source_subsystems: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_subsystems(subsystems: Vec<SubsystemId>) -> Self {
        Self {
            topics: Vec::new(),
            source_subsystems: subsystems,
        }
    }

    #[must_use]
    pub fn matches(&self, event: &PipelineEvent) -> bool {
        let topic = event.topic();
        let wants_topic = self.topics.is_empty()
            || self
                .topics
                .iter()
                .any(|t| *t == EventTopic::All || *t == topic);
        let wants_source = self.source_subsystems.is_empty()
            || self.source_subsystems.contains(&event.source_subsystem());

        wants_topic && wants_source
    }
}
