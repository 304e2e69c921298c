//! Configuration for Chunk Reassembly Subsystem

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reassembly configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReassemblyConfig {
    /// Appended to the key to form the artifact name
    pub artifact_suffix: String,
    /// Ceiling on a reconstructed file (bytes)
    pub max_artifact_bytes: usize,
    /// Maximum keys holding state at once. A new key evicts the least recently
    /// updated partial file; files awaiting a flush are never evicted
    pub max_pending_keys: usize,
    /// Partial files untouched for this long are discarded (seconds)
    pub idle_timeout_secs: u64,
    /// Deadline for a single sink write (milliseconds)
    pub sink_timeout_ms: u64,
    /// Maintenance retries of a failed write before it is escalated as a
    /// critical error. Retrying continues afterwards.
    pub sink_retry_attempts: u32,
    /// Period of idle-eviction and pending-flush sweeps (seconds)
    pub maintenance_interval_secs: u64,
    /// Number of partitioned workers
    pub worker_count: usize,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            artifact_suffix: ".gz".to_string(),
            max_artifact_bytes: 64 * 1024 * 1024,
            max_pending_keys: 1024,
            idle_timeout_secs: 300,
            sink_timeout_ms: 5000,
            sink_retry_attempts: 3,
            maintenance_interval_secs: 10,
            worker_count: 1,
        }
    }
}

impl ReassemblyConfig {
    /// Artifact name for a key.
    pub fn artifact_name(&self, key: &str) -> String {
        format!("{}{}", key, self.artifact_suffix)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_timeout_ms)
    }

    /// Failed writes of one file after which it is escalated.
    pub fn flush_failure_budget(&self) -> u32 {
        self.sink_retry_attempts.saturating_add(1)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs.max(1))
    }
}
