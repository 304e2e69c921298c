//! # AP-02: Chunk Reassembly Subsystem
//!
//! Rebuilds files from keyed streams of base64 chunk messages
//! (`page` / `totalPages` / `content`) and writes each finished file to an
//! artifact sink exactly once.
//!
//! ## Architecture
//!
//! - **Domain**: `ChunkRecord`, `ChunkAccumulator`, outcomes and errors
//! - **Algorithms**: chunk splitting (producer side), key partitioning
//! - **Ports**: Inbound (`ReassemblyApi`) and Outbound (`ArtifactSink`, `TimeSource`)
//! - **Adapters**: `FileSystemSink`, `InMemorySink`, `OutputDirLock`
//! - **Application**: `ReassemblyEngine`
//! - **IPC**: bus handler and partitioned workers
//!
//! ## Per-key Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Bytes of two files never mix | Ordinal 1 restarts the key; reset after every flush |
//! | Strict ordinal order | Out-of-order or total-changing chunks reset the key |
//! | Bounded memory | `max_artifact_bytes` per key, `max_pending_keys` overall |
//! | No silent loss on sink failure | Buffer kept in `Complete` until a write succeeds |
//! | Bad input is local | Decode and record errors drop one message, nothing else |
//!
//! ## Usage
//!
//! ```ignore
//! use ap_02_chunk_reassembly::{
//!     ChunkRecord, InMemorySink, ReassemblyApi, ReassemblyConfig, ReassemblyEngine,
//! };
//!
//! let sink = InMemorySink::new();
//! let mut engine = ReassemblyEngine::new(sink.clone(), ReassemblyConfig::default());
//!
//! engine.process_chunk(ChunkRecord::new("report", 1, 2, "AAEC")).await?;
//! engine.process_chunk(ChunkRecord::new("report", 2, 2, "AwQF")).await?;
//!
//! assert_eq!(sink.get("report.gz"), Some(vec![0, 1, 2, 3, 4, 5]));
//! ```

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ipc;
pub mod ports;

pub use adapters::{FileSystemSink, InMemorySink, LockError, OutputDirLock};
pub use algorithms::{assign_partition, chunk_events, split_into_chunks};
pub use application::ReassemblyEngine;
pub use config::ReassemblyConfig;
pub use domain::accumulator::{AccumulatorState, AppendResult, ChunkAccumulator, Timestamp};
pub use domain::errors::{
    AccumulatorError, ChunkingError, ReassemblyError, SequenceAnomaly, SinkError,
};
pub use domain::outcome::{ChunkOutcome, EvictionReason, ReassemblyNotice};
pub use domain::record::ChunkRecord;
pub use ipc::{DispatchError, PartitionedReassembly, ReassemblyHandler};
pub use ports::inbound::ReassemblyApi;
pub use ports::outbound::{ArtifactSink, ManualTimeSource, SystemTimeSource, TimeSource};
