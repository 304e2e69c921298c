//! # Partitioned Workers
//!
//! Spreads keys across N worker tasks. Each worker owns its own
//! `ReassemblyEngine`, so keys never share state and no locking is needed.
//! Routing uses `assign_partition`, which keeps every chunk of a key on one
//! worker in delivery order.
//!
//! ```text
//!                        ┌──→ worker 0 (engine, keys with hash % N == 0)
//! bus ──FileChunks──→ router ──→ worker 1
//!                        └──→ worker N-1
//! ```

use std::sync::Arc;

use shared_bus::{EventPublisher, PipelineEvent, Subscription};
use shared_types::FileChunkMessage;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::handler::ReassemblyHandler;
use crate::algorithms::assign_partition;
use crate::application::ReassemblyEngine;
use crate::config::ReassemblyConfig;
use crate::ports::outbound::{ArtifactSink, TimeSource};

/// Per-worker queue depth.
const WORKER_QUEUE_CAPACITY: usize = 256;

/// Errors routing a chunk to its worker.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Worker {partition} has stopped")]
    WorkerStopped { partition: usize },
}

/// N reassembly workers behind a key-hash router.
pub struct PartitionedReassembly {
    senders: Vec<mpsc::Sender<(String, FileChunkMessage)>>,
    workers: Vec<JoinHandle<()>>,
}

impl PartitionedReassembly {
    /// Spawn `config.worker_count` workers (at least one) sharing `sink`.
    pub fn spawn<S, T>(
        config: ReassemblyConfig,
        sink: Arc<S>,
        time: T,
        publisher: Arc<dyn EventPublisher>,
        shutdown: watch::Receiver<bool>,
    ) -> Self
    where
        S: ArtifactSink + 'static,
        T: TimeSource + Clone + 'static,
    {
        let count = config.worker_count.max(1);
        let mut senders = Vec::with_capacity(count);
        let mut workers = Vec::with_capacity(count);

        for _ in 0..count {
            let (tx, rx) = mpsc::channel(WORKER_QUEUE_CAPACITY);
            let engine =
                ReassemblyEngine::with_time_source(Arc::clone(&sink), time.clone(), config.clone());
            let handler = ReassemblyHandler::new(engine, Arc::clone(&publisher));

            workers.push(tokio::spawn(handler.run_channel(rx, shutdown.clone())));
            senders.push(tx);
        }

        info!(workers = count, "[ap-02] Partitioned reassembly started");
        Self { senders, workers }
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// Worker index that owns `key`.
    pub fn partition_of(&self, key: &str) -> usize {
        assign_partition(key, self.senders.len())
    }

    /// Queue a chunk on its key's worker. Waits while that worker is full.
    pub async fn route(&self, key: String, chunk: FileChunkMessage) -> Result<(), DispatchError> {
        let partition = self.partition_of(&key);
        self.senders[partition]
            .send((key, chunk))
            .await
            .map_err(|_| DispatchError::WorkerStopped { partition })
    }

    /// Forward chunk events from the bus until shutdown or the bus closes,
    /// then wait for the workers to finish.
    pub async fn run(self, mut subscription: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!("[ap-02] Chunk router started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("[ap-02] Shutdown signal received");
                    break;
                }
                event = subscription.recv() => {
                    match event {
                        Some(PipelineEvent::FileChunkReceived { key, chunk }) => {
                            if let Err(e) = self.route(key, chunk).await {
                                error!("[ap-02] ❌ {}", e);
                                break;
                            }
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
            }
        }

        self.join().await;
    }

    /// Close the worker queues and wait for every worker to drain and exit.
    pub async fn join(self) {
        drop(self.senders);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("[ap-02] Worker task failed: {}", e);
            }
        }
    }
}
