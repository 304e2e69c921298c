//! Results the engine hands back to its driver.

use shared_types::ArtifactDescriptor;

/// What processing one chunk did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Chunk appended; the file is still incomplete.
    Accumulated {
        ordinal: u32,
        total: u32,
        /// Bytes held for the key after this chunk.
        buffered: usize,
    },
    /// Chunk completed the file and the artifact was written.
    Completed(ArtifactDescriptor),
}

/// Why an accumulator was dropped without an error being returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// No chunk for longer than the idle timeout.
    Idle,
    /// Room was needed for a new key.
    Capacity,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Idle => "idle",
            EvictionReason::Capacity => "capacity",
        }
    }
}

/// Side effects of processing that the caller should report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyNotice {
    /// A chunk with ordinal 1 replaced an unfinished file.
    Restarted { key: String, discarded_bytes: usize },
    /// A partial file was evicted.
    Evicted {
        key: String,
        reason: EvictionReason,
        discarded_bytes: usize,
    },
    /// A previously failed flush succeeded on retry.
    Flushed(ArtifactDescriptor),
}

impl ReassemblyNotice {
    pub fn key(&self) -> &str {
        match self {
            ReassemblyNotice::Restarted { key, .. } | ReassemblyNotice::Evicted { key, .. } => key,
            ReassemblyNotice::Flushed(descriptor) => &descriptor.key,
        }
    }
}
