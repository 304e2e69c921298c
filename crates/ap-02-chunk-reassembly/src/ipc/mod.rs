//! IPC Module for Chunk Reassembly
//!
//! ## Bus Contract
//!
//! - Accept: `FileChunkReceived` (topic `FileChunks`)
//! - Publish: `ArtifactWritten`, `ReassemblyAborted` (topic `Artifacts`)
//! - Publish: `CriticalError` (topic `DeadLetterQueue`)
//!
//! Delivery order per key is assumed to be the publish order; the bus and
//! the partitioned router both preserve it.

pub mod dispatcher;
pub mod handler;

pub use dispatcher::{DispatchError, PartitionedReassembly};
pub use handler::ReassemblyHandler;
