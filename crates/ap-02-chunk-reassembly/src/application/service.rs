//! Reassembly Engine
//!
//! Owns one `ChunkAccumulator` per key and drives the completion protocol:
//!
//! ```text
//! Empty ──chunk < total──→ Accumulating ──chunk == total──→ Complete
//!   ↑                                                          │
//!   └────────────── sink write ok, reset ───────────────────────┘
//! ```
//!
//! A failed sink write leaves the key in `Complete` with its bytes intact
//! until a later flush succeeds.

use std::collections::HashMap;

use async_trait::async_trait;
use pipeline_telemetry::{
    time_histogram, ARTIFACTS_WRITTEN, ARTIFACT_BYTES, DECODE_ERRORS, PENDING_ACCUMULATORS,
    REASSEMBLY_EVICTIONS, SEQUENCE_ANOMALIES, SINK_FAILURES, SINK_WRITE_DURATION,
};
use sha2::{Digest, Sha256};
use shared_types::ArtifactDescriptor;
use tracing::{debug, info, warn};

use crate::config::ReassemblyConfig;
use crate::domain::{
    AccumulatorError, AccumulatorState, AppendResult, ChunkAccumulator, ChunkOutcome, ChunkRecord,
    EvictionReason, ReassemblyError, ReassemblyNotice, SequenceAnomaly, SinkError, Timestamp,
};
use crate::ports::inbound::ReassemblyApi;
use crate::ports::outbound::{ArtifactSink, SystemTimeSource, TimeSource};

/// Reassembly engine for a disjoint set of keys.
pub struct ReassemblyEngine<S, T = SystemTimeSource> {
    accumulators: HashMap<String, ChunkAccumulator>,
    sink: S,
    time: T,
    config: ReassemblyConfig,
    notices: Vec<ReassemblyNotice>,
    reported_pending: i64,
}

impl<S: ArtifactSink> ReassemblyEngine<S, SystemTimeSource> {
    /// Create an engine on the system clock.
    pub fn new(sink: S, config: ReassemblyConfig) -> Self {
        Self::with_time_source(sink, SystemTimeSource, config)
    }
}

impl<S: ArtifactSink, T: TimeSource> ReassemblyEngine<S, T> {
    /// Create an engine with a custom clock.
    pub fn with_time_source(sink: S, time: T, config: ReassemblyConfig) -> Self {
        Self {
            accumulators: HashMap::new(),
            sink,
            time,
            config,
            notices: Vec::new(),
            reported_pending: 0,
        }
    }

    pub fn config(&self) -> &ReassemblyConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Current time from the engine's clock.
    pub fn now(&self) -> Timestamp {
        self.time.now()
    }

    /// Lifecycle state of `key`. Unknown keys are `Empty`.
    pub fn state_of(&self, key: &str) -> AccumulatorState {
        self.accumulators
            .get(key)
            .map(|a| a.state())
            .unwrap_or(AccumulatorState::Empty)
    }

    pub fn accumulator(&self, key: &str) -> Option<&ChunkAccumulator> {
        self.accumulators.get(key)
    }

    /// Take the notices produced since the last call.
    pub fn drain_notices(&mut self) -> Vec<ReassemblyNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Flush `key` if it is waiting on a failed write.
    ///
    /// `Ok(None)` when the key has nothing pending.
    pub async fn retry_key(
        &mut self,
        key: &str,
    ) -> Result<Option<ArtifactDescriptor>, ReassemblyError> {
        let Some(acc) = self.accumulators.get_mut(key) else {
            return Ok(None);
        };
        if acc.state() != AccumulatorState::Complete {
            return Ok(None);
        }

        let result = write_artifact(&self.sink, &self.config, key, acc).await;
        self.sync_pending_gauge();
        result.map(Some)
    }

    /// Make room for `key` if it is new and the table is full.
    ///
    /// Dormant entries go first, then the least recently updated partial
    /// file. Files awaiting a flush still own the only copy of their bytes
    /// and are never evicted; if nothing else is left the key is refused.
    fn ensure_capacity(&mut self, key: &str) -> Result<(), ReassemblyError> {
        if self.accumulators.contains_key(key)
            || self.accumulators.len() < self.config.max_pending_keys
        {
            return Ok(());
        }

        let victim = self
            .accumulators
            .iter()
            .filter(|(_, a)| a.state() != AccumulatorState::Complete)
            .min_by_key(|(_, a)| (a.state() != AccumulatorState::Empty, a.last_updated()))
            .map(|(k, _)| k.clone());

        let Some(victim) = victim else {
            warn!(key = %key, limit = self.config.max_pending_keys, "[ap-02] Every slot awaits a flush, refusing new key");
            return Err(ReassemblyError::CapacityExhausted {
                key: key.to_string(),
                limit: self.config.max_pending_keys,
            });
        };
        if let Some(acc) = self.accumulators.remove(&victim) {
            if acc.state() != AccumulatorState::Empty {
                warn!(
                    key = %victim,
                    discarded_bytes = acc.cursor(),
                    "[ap-02] Evicting accumulator to make room"
                );
                REASSEMBLY_EVICTIONS
                    .with_label_values(&[EvictionReason::Capacity.as_str()])
                    .inc();
                self.notices.push(ReassemblyNotice::Evicted {
                    key: victim,
                    reason: EvictionReason::Capacity,
                    discarded_bytes: acc.cursor(),
                });
            }
        }
        Ok(())
    }

    fn sync_pending_gauge(&mut self) {
        let pending = self.pending_keys() as i64;
        let delta = pending - self.reported_pending;
        if delta != 0 {
            PENDING_ACCUMULATORS.add(delta as f64);
            self.reported_pending = pending;
        }
    }

    async fn process(&mut self, record: ChunkRecord) -> Result<ChunkOutcome, ReassemblyError> {
        let bytes = match record.decode_payload() {
            Ok(bytes) => bytes,
            Err(e) => {
                DECODE_ERRORS.inc();
                return Err(e);
            }
        };

        let ChunkRecord {
            key,
            ordinal,
            total,
            ..
        } = record;

        // The previous file must be written before this chunk may touch the
        // buffer. If it still cannot be, the chunk is refused as a whole.
        match self.retry_key(&key).await {
            Ok(Some(descriptor)) => {
                info!(key = %key, "[ap-02] Pending artifact flushed before next file");
                self.notices.push(ReassemblyNotice::Flushed(descriptor));
            }
            Ok(None) => {}
            Err(ReassemblyError::SinkWrite { key, source }) => {
                return Err(ReassemblyError::PendingFlush { key, source });
            }
            Err(e) => return Err(e),
        }

        self.ensure_capacity(&key)?;

        let now = self.time.now();
        let max_bytes = self.config.max_artifact_bytes;
        let acc = self
            .accumulators
            .entry(key.clone())
            .or_insert_with(|| ChunkAccumulator::new(max_bytes, now));
        acc.touch(now);

        if ordinal == 1 && acc.state() == AccumulatorState::Accumulating {
            let anomaly = SequenceAnomaly::Restarted {
                discarded_bytes: acc.cursor(),
            };
            warn!(key = %key, %anomaly, "[ap-02] Restarting key");
            SEQUENCE_ANOMALIES.with_label_values(&[anomaly.kind()]).inc();
            self.notices.push(ReassemblyNotice::Restarted {
                key: key.clone(),
                discarded_bytes: acc.cursor(),
            });
            acc.reset();
        }

        match acc.append(&bytes, ordinal, total) {
            Ok(AppendResult::Accumulating { .. }) => Ok(ChunkOutcome::Accumulated {
                ordinal,
                total,
                buffered: acc.cursor(),
            }),
            Ok(AppendResult::Complete) => write_artifact(&self.sink, &self.config, &key, acc)
                .await
                .map(ChunkOutcome::Completed),
            Err(AccumulatorError::Anomaly(anomaly)) => {
                SEQUENCE_ANOMALIES.with_label_values(&[anomaly.kind()]).inc();
                acc.reset();
                Err(ReassemblyError::SequenceAnomaly { key, anomaly })
            }
            Err(AccumulatorError::Overflow { size, max }) => {
                acc.reset();
                Err(ReassemblyError::ArtifactTooLarge { key, size, max })
            }
        }
    }
}

/// Flush a completed accumulator to the sink and reset it on success.
async fn write_artifact<S: ArtifactSink>(
    sink: &S,
    config: &ReassemblyConfig,
    key: &str,
    acc: &mut ChunkAccumulator,
) -> Result<ArtifactDescriptor, ReassemblyError> {
    let name = config.artifact_name(key);
    let data = acc.flush();

    let written = {
        let _timer = time_histogram!(SINK_WRITE_DURATION);
        tokio::time::timeout(config.sink_timeout(), sink.write(&name, data)).await
    };

    let source = match written {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(_) => Some(SinkError::Timeout {
            millis: config.sink_timeout_ms,
        }),
    };
    if let Some(source) = source {
        SINK_FAILURES.inc();
        warn!(key = %key, artifact = %name, error = %source, "[ap-02] Artifact write failed, keeping buffer");
        return Err(ReassemblyError::SinkWrite {
            key: key.to_string(),
            source,
        });
    }

    let descriptor = ArtifactDescriptor {
        key: key.to_string(),
        name,
        size: data.len() as u64,
        sha256: hex::encode(Sha256::digest(data)),
    };
    acc.reset();

    ARTIFACTS_WRITTEN.inc();
    ARTIFACT_BYTES.inc_by(descriptor.size as f64);
    debug!(key = %key, artifact = %descriptor.name, bytes = descriptor.size, "[ap-02] Key reset after flush");

    Ok(descriptor)
}

#[async_trait]
impl<S: ArtifactSink, T: TimeSource> ReassemblyApi for ReassemblyEngine<S, T> {
    async fn process_chunk(
        &mut self,
        record: ChunkRecord,
    ) -> Result<ChunkOutcome, ReassemblyError> {
        let result = self.process(record).await;
        self.sync_pending_gauge();
        result
    }

    async fn retry_pending(&mut self) -> Vec<Result<ArtifactDescriptor, ReassemblyError>> {
        let keys: Vec<String> = self
            .accumulators
            .iter()
            .filter(|(_, a)| a.state() == AccumulatorState::Complete)
            .map(|(k, _)| k.clone())
            .collect();

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(result) = self.retry_key(&key).await.transpose() {
                results.push(result);
            }
        }
        results
    }

    fn gc_idle(&mut self, now: Timestamp) -> Vec<String> {
        let timeout = self.config.idle_timeout_secs;
        let idle: Vec<String> = self
            .accumulators
            .iter()
            .filter(|(_, a)| a.state() != AccumulatorState::Complete && a.is_idle(now, timeout))
            .map(|(k, _)| k.clone())
            .collect();

        let mut evicted = Vec::new();
        for key in idle {
            let Some(acc) = self.accumulators.remove(&key) else {
                continue;
            };
            if acc.state() == AccumulatorState::Empty {
                continue;
            }

            warn!(key = %key, discarded_bytes = acc.cursor(), "[ap-02] Evicting idle accumulator");
            REASSEMBLY_EVICTIONS
                .with_label_values(&[EvictionReason::Idle.as_str()])
                .inc();
            self.notices.push(ReassemblyNotice::Evicted {
                key: key.clone(),
                reason: EvictionReason::Idle,
                discarded_bytes: acc.cursor(),
            });
            evicted.push(key);
        }

        self.sync_pending_gauge();
        evicted
    }

    fn pending_keys(&self) -> usize {
        self.accumulators
            .values()
            .filter(|a| a.state() != AccumulatorState::Empty)
            .count()
    }
}

impl<S, T> Drop for ReassemblyEngine<S, T> {
    fn drop(&mut self) {
        if self.reported_pending != 0 {
            PENDING_ACCUMULATORS.sub(self.reported_pending as f64);
        }
    }
}
