//! Adapters for Chunk Reassembly
//!
//! - `filesystem`: atomic temp-then-rename artifact sink
//! - `lock`: exclusive output-directory lock
//! - `memory`: in-memory sink for tests and demos

pub mod filesystem;
pub mod lock;
pub mod memory;

pub use filesystem::FileSystemSink;
pub use lock::{LockError, OutputDirLock};
pub use memory::InMemorySink;
