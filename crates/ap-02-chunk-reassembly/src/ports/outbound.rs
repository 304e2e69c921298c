//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the reassembly engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{accumulator::Timestamp, errors::SinkError};

/// Durable write target for reconstructed files.
///
/// `write` must create or overwrite `name` so that a partially written
/// artifact is never visible under that name.
///
/// Production: `FileSystemSink` (adapters/filesystem.rs)
/// Testing: `InMemorySink` (adapters/memory.rs)
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn write(&self, name: &str, data: &[u8]) -> Result<(), SinkError>;
}

#[async_trait]
impl<S: ArtifactSink + ?Sized> ArtifactSink for Arc<S> {
    async fn write(&self, name: &str, data: &[u8]) -> Result<(), SinkError> {
        (**self).write(name, data).await
    }
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in seconds since epoch.
    fn now(&self) -> Timestamp;
}

/// Default time source using system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Time source moved by hand. Clones share the same clock.
#[derive(Debug, Default, Clone)]
pub struct ManualTimeSource {
    now: Arc<AtomicU64>,
}

impl ManualTimeSource {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
