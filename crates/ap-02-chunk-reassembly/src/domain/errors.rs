//! Error types for Chunk Reassembly
//!
//! Every error here is scoped to a single message or a single key; none of
//! them stops the engine.

use thiserror::Error;

/// A chunk whose position contradicts what the key has seen so far.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceAnomaly {
    /// `total` differs from the one declared by the first chunk of the file.
    #[error("total changed mid-file: expected {expected}, got {got}")]
    TotalChanged { expected: u32, got: u32 },

    /// Ordinal is not the next one in sequence.
    #[error("out-of-order chunk: expected ordinal {expected}, got {got}")]
    OutOfOrder { expected: u32, got: u32 },

    /// Ordinal beyond the declared total.
    #[error("ordinal {ordinal} exceeds total {total}")]
    OrdinalExceedsTotal { ordinal: u32, total: u32 },

    /// A new file started (ordinal 1) before the previous one completed.
    #[error("new file started after {discarded_bytes} bytes of an unfinished file")]
    Restarted { discarded_bytes: usize },
}

impl SequenceAnomaly {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SequenceAnomaly::TotalChanged { .. } => "total_changed",
            SequenceAnomaly::OutOfOrder { .. } => "out_of_order",
            SequenceAnomaly::OrdinalExceedsTotal { .. } => "ordinal_exceeds_total",
            SequenceAnomaly::Restarted { .. } => "restarted",
        }
    }
}

/// Errors raised by a single accumulator, before the key is known.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccumulatorError {
    #[error(transparent)]
    Anomaly(#[from] SequenceAnomaly),

    /// Appending would exceed the reconstructed-size ceiling.
    #[error("buffer would grow to {size} bytes, limit is {max}")]
    Overflow { size: usize, max: usize },
}

/// Errors from an artifact sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Underlying storage failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Artifact name cannot be stored safely.
    #[error("Invalid artifact name: {0:?}")]
    InvalidName(String),

    /// Write did not finish in time.
    #[error("Write timed out after {millis}ms")]
    Timeout { millis: u64 },
}

/// All errors that can occur while reassembling chunk streams.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReassemblyError {
    /// Record is structurally invalid; dropped, no state touched.
    #[error("Invalid chunk record for key {key:?}: {reason}")]
    InvalidRecord { key: String, reason: String },

    /// Payload is not valid base64; dropped, no state touched.
    #[error("Chunk {ordinal}/{total} for key {key:?} is not valid base64: {reason}")]
    Decode {
        key: String,
        ordinal: u32,
        total: u32,
        reason: String,
    },

    /// Inconsistent sequence; the key's accumulator was discarded.
    #[error("Sequence anomaly for key {key:?}: {anomaly}")]
    SequenceAnomaly { key: String, anomaly: SequenceAnomaly },

    /// Reconstructed size ceiling hit; the key's accumulator was discarded.
    #[error("Artifact for key {key:?} exceeds {max} bytes ({size} bytes)")]
    ArtifactTooLarge { key: String, size: usize, max: usize },

    /// Sink write failed; the completed buffer is kept for retry.
    #[error("Artifact write failed for key {key:?}: {source}")]
    SinkWrite {
        key: String,
        #[source]
        source: SinkError,
    },

    /// The key's previous file is still unflushed and writing it failed
    /// again. The incoming chunk was not applied; the producer must resend it.
    #[error("Chunk for key {key:?} rejected, previous artifact still unflushed: {source}")]
    PendingFlush {
        key: String,
        #[source]
        source: SinkError,
    },

    /// Every slot holds a file awaiting a flush; the new key was not admitted.
    #[error("Chunk for key {key:?} rejected, {limit} keys already awaiting a flush")]
    CapacityExhausted { key: String, limit: usize },
}

impl ReassemblyError {
    /// The key the error is scoped to.
    pub fn key(&self) -> &str {
        match self {
            ReassemblyError::InvalidRecord { key, .. }
            | ReassemblyError::Decode { key, .. }
            | ReassemblyError::SequenceAnomaly { key, .. }
            | ReassemblyError::ArtifactTooLarge { key, .. }
            | ReassemblyError::SinkWrite { key, .. }
            | ReassemblyError::PendingFlush { key, .. }
            | ReassemblyError::CapacityExhausted { key, .. } => key,
        }
    }

    /// Whether the key's in-progress reconstruction was discarded.
    pub fn discarded_state(&self) -> bool {
        matches!(
            self,
            ReassemblyError::SequenceAnomaly { .. } | ReassemblyError::ArtifactTooLarge { .. }
        )
    }

    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ReassemblyError::InvalidRecord { .. } => "invalid_record",
            ReassemblyError::Decode { .. } => "decode",
            ReassemblyError::SequenceAnomaly { .. } => "sequence_anomaly",
            ReassemblyError::ArtifactTooLarge { .. } => "too_large",
            ReassemblyError::SinkWrite { .. } => "sink_write",
            ReassemblyError::PendingFlush { .. } => "pending_flush",
            ReassemblyError::CapacityExhausted { .. } => "capacity_exhausted",
        }
    }
}

/// Errors splitting a file into chunk messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkingError {
    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("File needs {chunks} chunks, more than the {max} a message can address")]
    TooManyChunks { chunks: usize, max: u32 },
}
