//! Inbound Ports (Driving Ports / API)

use crate::domain::{
    accumulator::Timestamp, errors::ReassemblyError, outcome::ChunkOutcome, record::ChunkRecord,
};
use async_trait::async_trait;
use shared_types::ArtifactDescriptor;

/// Primary Chunk Reassembly API
///
/// One implementor owns the state for a disjoint set of keys and is driven
/// by a single task, so every method takes `&mut self`.
#[async_trait]
pub trait ReassemblyApi: Send {
    /// Process one chunk record.
    ///
    /// 1. Decode the payload (failure drops the record, state untouched)
    /// 2. Retry a pending flush for the key, if any
    /// 3. Append at the key's cursor
    /// 4. On the final chunk, write the artifact and reset the key
    async fn process_chunk(&mut self, record: ChunkRecord)
        -> Result<ChunkOutcome, ReassemblyError>;

    /// Re-attempt every completed artifact whose write previously failed.
    async fn retry_pending(&mut self) -> Vec<Result<ArtifactDescriptor, ReassemblyError>>;

    /// Discard partial files idle at `now`. Returns the evicted keys.
    fn gc_idle(&mut self, now: Timestamp) -> Vec<String>;

    /// Keys holding a partial or unflushed file.
    fn pending_keys(&self) -> usize;
}
