//! In-memory artifact sink.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::errors::SinkError;
use crate::ports::outbound::ArtifactSink;

/// Keeps artifacts in a map. Clones share storage.
///
/// `fail_next_writes(n)` makes the next `n` writes return `SinkError::Io`
/// without storing anything.
#[derive(Debug, Default, Clone)]
pub struct InMemorySink {
    artifacts: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    failures: Arc<RwLock<u32>>,
    writes: Arc<RwLock<u64>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_writes(&self, count: u32) {
        *self.failures.write() = count;
    }

    /// Artifact stored under `name`.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.artifacts.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }

    /// Successful writes, overwrites included.
    pub fn write_count(&self) -> u64 {
        *self.writes.read()
    }
}

#[async_trait]
impl ArtifactSink for InMemorySink {
    async fn write(&self, name: &str, data: &[u8]) -> Result<(), SinkError> {
        {
            let mut failures = self.failures.write();
            if *failures > 0 {
                *failures -= 1;
                return Err(SinkError::Io("injected failure".to_string()));
            }
        }

        self.artifacts.write().insert(name.to_string(), data.to_vec());
        *self.writes.write() += 1;
        Ok(())
    }
}
