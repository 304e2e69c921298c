//! Bus Handler for Chunk Reassembly
//!
//! Turns `FileChunkReceived` events into engine calls and publishes what
//! happened:
//!
//! - `ArtifactWritten` when a file is flushed
//! - `ReassemblyAborted` when a key's partial file is discarded
//! - `CriticalError` when a flush still fails after the retry budget
//!
//! Failed writes are never retried inline: the loop keeps serving other
//! keys and the maintenance tick retries pending flushes.

use std::collections::HashMap;
use std::sync::Arc;

use pipeline_telemetry::{log_artifact_event, log_chunk_event, CHUNKS_RECEIVED, SUBSYSTEM_ERRORS};
use shared_bus::{EventPublisher, PipelineEvent, Subscription};
use shared_types::{ArtifactDescriptor, FileChunkMessage, SubsystemId};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::application::ReassemblyEngine;
use crate::config::ReassemblyConfig;
use crate::domain::{ChunkOutcome, ChunkRecord, ReassemblyError, ReassemblyNotice};
use crate::ports::inbound::ReassemblyApi;
use crate::ports::outbound::{ArtifactSink, SystemTimeSource, TimeSource};

const SUBSYSTEM: SubsystemId = SubsystemId::ChunkReassembly;

/// Drives one `ReassemblyEngine` from the bus.
pub struct ReassemblyHandler<S, T = SystemTimeSource> {
    engine: ReassemblyEngine<S, T>,
    publisher: Arc<dyn EventPublisher>,
    config: ReassemblyConfig,
    /// Failed write attempts per key whose file is still unflushed.
    flush_failures: HashMap<String, u32>,
}

impl<S: ArtifactSink, T: TimeSource> ReassemblyHandler<S, T> {
    pub fn new(engine: ReassemblyEngine<S, T>, publisher: Arc<dyn EventPublisher>) -> Self {
        let config = engine.config().clone();
        Self {
            engine,
            publisher,
            config,
            flush_failures: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &ReassemblyEngine<S, T> {
        &self.engine
    }

    /// Handle any bus event; everything but `FileChunkReceived` is ignored.
    pub async fn handle_event(&mut self, event: PipelineEvent) {
        if let PipelineEvent::FileChunkReceived { key, chunk } = event {
            let _ = self.handle_chunk(key, chunk).await;
        }
    }

    /// Process one keyed chunk message and publish the result.
    pub async fn handle_chunk(
        &mut self,
        key: String,
        chunk: FileChunkMessage,
    ) -> Result<ChunkOutcome, ReassemblyError> {
        let record = match ChunkRecord::from_message(key, chunk) {
            Ok(record) => record,
            Err(e) => {
                warn!("[ap-02] Dropping chunk: {}", e);
                self.count_rejection(&e);
                return Err(e);
            }
        };
        let key = record.key.clone();

        let result = self.engine.process_chunk(record).await;
        self.publish_notices().await;

        match &result {
            Ok(ChunkOutcome::Accumulated {
                ordinal,
                total,
                buffered,
            }) => {
                CHUNKS_RECEIVED.with_label_values(&["accumulated"]).inc();
                log_chunk_event!(
                    debug,
                    SUBSYSTEM.tag(),
                    "[ap-02] Chunk appended",
                    key,
                    ordinal,
                    total,
                    buffered
                );
            }
            Ok(ChunkOutcome::Completed(descriptor)) => {
                CHUNKS_RECEIVED.with_label_values(&["completed"]).inc();
                self.flush_failures.remove(&key);
                self.publish_artifact(descriptor.clone()).await;
            }
            Err(e) => {
                self.count_rejection(e);
                self.report_failure(e).await;
            }
        }

        result
    }

    /// Periodic maintenance: evict idle partial files, retry unflushed ones.
    pub async fn tick(&mut self) {
        let now = self.engine.now();
        let evicted = self.engine.gc_idle(now);
        if !evicted.is_empty() {
            info!(count = evicted.len(), "[ap-02] Idle accumulators evicted");
        }

        for result in self.engine.retry_pending().await {
            match result {
                Ok(descriptor) => {
                    let attempts = self.flush_failures.remove(&descriptor.key).unwrap_or(0) + 1;
                    info!(key = %descriptor.key, attempts, "[ap-02] Pending artifact flushed");
                    self.publish_artifact(descriptor).await;
                }
                Err(e) => {
                    debug!(key = %e.key(), error = %e, "[ap-02] Pending flush still failing");
                    self.record_flush_failure(&e).await;
                }
            }
        }

        self.publish_notices().await;
    }

    /// Run against a bus subscription until shutdown or the bus closes.
    pub async fn run(mut self, mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!("[ap-02] Chunk reassembly handler started");

        let mut maintenance = tokio::time::interval(self.config.maintenance_interval());
        maintenance.tick().await;
        let mut lagged = 0;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("[ap-02] Shutdown signal received");
                    break;
                }
                event = subscription.recv() => {
                    let Some(event) = event else {
                        info!("[ap-02] Event bus closed");
                        break;
                    };
                    if subscription.lagged() > lagged {
                        warn!(
                            missed = subscription.lagged() - lagged,
                            "[ap-02] Subscriber lagged, chunks were lost; affected keys will report sequence anomalies"
                        );
                        lagged = subscription.lagged();
                    }
                    self.handle_event(event).await;
                }
                _ = maintenance.tick() => {
                    self.tick().await;
                }
            }
        }

        self.log_dropped_state();
    }

    /// Run against a worker channel fed by `PartitionedReassembly`.
    pub async fn run_channel(
        mut self,
        mut receiver: mpsc::Receiver<(String, FileChunkMessage)>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut maintenance = tokio::time::interval(self.config.maintenance_interval());
        maintenance.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                message = receiver.recv() => {
                    let Some((key, chunk)) = message else {
                        break;
                    };
                    let _ = self.handle_chunk(key, chunk).await;
                }
                _ = maintenance.tick() => {
                    self.tick().await;
                }
            }
        }

        self.log_dropped_state();
    }

    fn log_dropped_state(&self) {
        let pending = self.engine.pending_keys();
        if pending > 0 {
            warn!(pending, "[ap-02] Stopping with unfinished files; they are dropped");
        }
    }

    fn count_rejection(&self, error: &ReassemblyError) {
        CHUNKS_RECEIVED.with_label_values(&["rejected"]).inc();
        SUBSYSTEM_ERRORS
            .with_label_values(&[SUBSYSTEM.tag(), error.kind()])
            .inc();
    }

    async fn publish_artifact(&self, descriptor: ArtifactDescriptor) {
        log_artifact_event!(
            info,
            SUBSYSTEM.tag(),
            "[ap-02] ✓ Artifact written",
            descriptor.key,
            descriptor.name,
            bytes = descriptor.size,
            sha256 = %descriptor.sha256
        );
        self.publisher
            .publish(PipelineEvent::ArtifactWritten(descriptor))
            .await;
    }

    /// Count a failed write and escalate once the budget is used up.
    async fn record_flush_failure(&mut self, error: &ReassemblyError) {
        let key = error.key();
        let failures = {
            let count = self.flush_failures.entry(key.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if failures == self.config.flush_failure_budget() {
            error!(key = %key, failures, "[ap-02] ❌ {}", error);
            self.publisher
                .publish(PipelineEvent::CriticalError {
                    subsystem: SUBSYSTEM,
                    error: format!("{error} ({failures} failed attempts, still retrying)"),
                })
                .await;
        }
    }

    async fn report_failure(&mut self, error: &ReassemblyError) {
        match error {
            ReassemblyError::SinkWrite { key, .. } => {
                warn!(key = %key, "[ap-02] {}, will retry", error);
                self.record_flush_failure(error).await;
            }
            ReassemblyError::PendingFlush { key, .. } => {
                warn!(key = %key, "[ap-02] {}", error);
                self.record_flush_failure(error).await;
            }
            e if e.discarded_state() => {
                warn!(key = %e.key(), "[ap-02] {}", e);
                self.publisher
                    .publish(PipelineEvent::ReassemblyAborted {
                        key: e.key().to_string(),
                        reason: e.to_string(),
                    })
                    .await;
            }
            e => {
                warn!(key = %e.key(), "[ap-02] Dropping chunk: {}", e);
            }
        }
    }

    async fn publish_notices(&mut self) {
        for notice in self.engine.drain_notices() {
            match notice {
                ReassemblyNotice::Flushed(descriptor) => {
                    self.flush_failures.remove(&descriptor.key);
                    self.publish_artifact(descriptor).await;
                }
                ReassemblyNotice::Restarted {
                    key,
                    discarded_bytes,
                } => {
                    self.publisher
                        .publish(PipelineEvent::ReassemblyAborted {
                            key,
                            reason: format!(
                                "new file started, {discarded_bytes} bytes of the previous one discarded"
                            ),
                        })
                        .await;
                }
                ReassemblyNotice::Evicted {
                    key,
                    reason,
                    discarded_bytes,
                } => {
                    self.publisher
                        .publish(PipelineEvent::ReassemblyAborted {
                            key,
                            reason: format!(
                                "evicted ({}), {discarded_bytes} bytes discarded",
                                reason.as_str()
                            ),
                        })
                        .await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySink;
    use crate::algorithms::split_into_chunks;
    use crate::ports::outbound::ManualTimeSource;
    use shared_bus::{EventFilter, EventTopic, InMemoryEventBus};
    use std::time::Duration;

    fn setup(
        config: ReassemblyConfig,
    ) -> (
        ReassemblyHandler<InMemorySink, ManualTimeSource>,
        Arc<InMemoryEventBus>,
        InMemorySink,
        ManualTimeSource,
    ) {
        let bus = Arc::new(InMemoryEventBus::new());
        let sink = InMemorySink::new();
        let time = ManualTimeSource::new(1000);
        let engine = ReassemblyEngine::with_time_source(sink.clone(), time.clone(), config);
        let handler = ReassemblyHandler::new(engine, bus.clone());
        (handler, bus, sink, time)
    }

    fn fast_retry() -> ReassemblyConfig {
        ReassemblyConfig {
            sink_retry_attempts: 2,
            ..Default::default()
        }
    }

    async fn next_event(sub: &mut Subscription) -> PipelineEvent {
        tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("timed out waiting for event")
            .expect("bus closed")
    }

    #[tokio::test]
    async fn test_completed_file_publishes_artifact() {
        let (mut handler, bus, sink, _) = setup(ReassemblyConfig::default());
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Artifacts]));

        for chunk in split_into_chunks(b"hello world", 4).unwrap() {
            handler.handle_chunk("greeting".to_string(), chunk).await.unwrap();
        }

        match next_event(&mut sub).await {
            PipelineEvent::ArtifactWritten(descriptor) => {
                assert_eq!(descriptor.key, "greeting");
                assert_eq!(descriptor.name, "greeting.gz");
                assert_eq!(descriptor.size, 11);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(sink.get("greeting.gz"), Some(b"hello world".to_vec()));
    }

    #[tokio::test]
    async fn test_invalid_record_is_dropped() {
        let (mut handler, _, _, _) = setup(ReassemblyConfig::default());

        let err = handler
            .handle_chunk(String::new(), FileChunkMessage::new(1, 1, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ReassemblyError::InvalidRecord { .. }));
        assert_eq!(handler.engine().pending_keys(), 0);
    }

    #[tokio::test]
    async fn test_anomaly_publishes_abort() {
        let (mut handler, bus, _, _) = setup(ReassemblyConfig::default());
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Artifacts]));

        let chunks = split_into_chunks(&[7u8; 30], 10).unwrap();
        handler.handle_chunk("k".to_string(), chunks[0].clone()).await.unwrap();
        assert!(handler
            .handle_chunk("k".to_string(), chunks[2].clone())
            .await
            .is_err());

        match next_event(&mut sub).await {
            PipelineEvent::ReassemblyAborted { key, reason } => {
                assert_eq!(key, "k");
                assert!(reason.contains("out-of-order"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_hold_up_other_keys() {
        let (mut handler, bus, sink, _) = setup(fast_retry());
        let mut artifacts = bus.subscribe(EventFilter::topics(vec![EventTopic::Artifacts]));
        sink.fail_next_writes(1);

        let err = handler
            .handle_chunk("k".to_string(), FileChunkMessage::new(1, 1, "AAEC"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReassemblyError::SinkWrite { .. }));

        let outcome = handler
            .handle_chunk("other".to_string(), FileChunkMessage::new(1, 1, "AwQF"))
            .await
            .unwrap();
        assert!(matches!(outcome, ChunkOutcome::Completed(_)));
        assert_eq!(sink.get("other.gz"), Some(vec![3, 4, 5]));
        assert!(sink.get("k.gz").is_none());

        handler.tick().await;

        assert_eq!(sink.get("k.gz"), Some(vec![0, 1, 2]));
        let mut written = Vec::new();
        while let Ok(Some(PipelineEvent::ArtifactWritten(d))) = artifacts.try_recv() {
            written.push(d.key);
        }
        assert_eq!(written, vec!["other".to_string(), "k".to_string()]);
    }

    #[tokio::test]
    async fn test_chunk_behind_unflushed_file_is_refused_then_accepted_on_resend() {
        let (mut handler, _, sink, _) = setup(fast_retry());
        sink.fail_next_writes(2);

        assert!(handler
            .handle_chunk("k".to_string(), FileChunkMessage::new(1, 1, "AAEC"))
            .await
            .is_err());

        let err = handler
            .handle_chunk("k".to_string(), FileChunkMessage::new(1, 2, "AwQF"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReassemblyError::PendingFlush { .. }));
        assert_eq!(handler.engine().accumulator("k").unwrap().flush(), &[0, 1, 2]);

        let outcome = handler
            .handle_chunk("k".to_string(), FileChunkMessage::new(1, 2, "AwQF"))
            .await
            .unwrap();
        assert!(matches!(outcome, ChunkOutcome::Accumulated { ordinal: 1, .. }));
        assert_eq!(sink.get("k.gz"), Some(vec![0, 1, 2]));

        let outcome = handler
            .handle_chunk("k".to_string(), FileChunkMessage::new(2, 2, "BgcI"))
            .await
            .unwrap();
        assert!(matches!(outcome, ChunkOutcome::Completed(_)));
        assert_eq!(sink.get("k.gz"), Some(vec![3, 4, 5, 6, 7, 8]));
    }

    #[tokio::test]
    async fn test_persistent_sink_failure_goes_critical_then_tick_recovers() {
        let (mut handler, bus, sink, _) = setup(fast_retry());
        let mut dlq = bus.subscribe(EventFilter::topics(vec![EventTopic::DeadLetterQueue]));
        let mut artifacts = bus.subscribe(EventFilter::topics(vec![EventTopic::Artifacts]));
        sink.fail_next_writes(3);

        let err = handler
            .handle_chunk("k".to_string(), FileChunkMessage::new(1, 1, "AAEC"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReassemblyError::SinkWrite { .. }));

        handler.tick().await;
        assert!(matches!(dlq.try_recv(), Ok(None)));

        handler.tick().await;
        assert!(matches!(
            next_event(&mut dlq).await,
            PipelineEvent::CriticalError {
                subsystem: SubsystemId::ChunkReassembly,
                ..
            }
        ));

        handler.tick().await;

        assert!(matches!(
            next_event(&mut artifacts).await,
            PipelineEvent::ArtifactWritten(_)
        ));
        assert_eq!(sink.get("k.gz"), Some(vec![0, 1, 2]));
        assert!(matches!(dlq.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_tick_reports_idle_eviction() {
        let config = ReassemblyConfig {
            idle_timeout_secs: 5,
            ..Default::default()
        };
        let (mut handler, bus, _, time) = setup(config);
        let mut sub = bus.subscribe(EventFilter::topics(vec![EventTopic::Artifacts]));

        handler
            .handle_chunk("k".to_string(), FileChunkMessage::new(1, 2, "AAEC"))
            .await
            .unwrap();
        time.advance(10);
        handler.tick().await;

        match next_event(&mut sub).await {
            PipelineEvent::ReassemblyAborted { key, reason } => {
                assert_eq!(key, "k");
                assert!(reason.contains("idle"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (handler, bus, sink, _) = setup(ReassemblyConfig::default());
        let subscription = bus.subscribe(EventFilter::topics(vec![EventTopic::FileChunks]));
        let mut artifacts = bus.subscribe(EventFilter::topics(vec![EventTopic::Artifacts]));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(handler.run(subscription, shutdown_rx));

        bus.publish(PipelineEvent::FileChunkReceived {
            key: "k".to_string(),
            chunk: FileChunkMessage::new(1, 1, "AAEC"),
        })
        .await;
        assert!(matches!(
            next_event(&mut artifacts).await,
            PipelineEvent::ArtifactWritten(_)
        ));
        assert_eq!(sink.len(), 1);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("handler did not stop")
            .unwrap();
    }
}
