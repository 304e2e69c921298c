//! Algorithms for Chunk Reassembly
//!
//! - `chunking`: producer-side split of a file into chunk messages
//! - `partition`: key to worker assignment

pub mod chunking;
pub mod partition;

pub use chunking::{chunk_events, split_into_chunks};
pub use partition::assign_partition;
