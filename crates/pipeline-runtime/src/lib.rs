//! # Pipeline Runtime
//!
//! Wires the subsystems to one in-memory event bus and runs them until
//! shutdown.
//!
//! ```text
//!   PageViewSource(1) ──PageViewed──→ ┌─────────┐ ──→ PageViewLogger(1)
//!                                     │   Bus   │
//!   publish_file ──FileChunkReceived→ │         │ ──→ ReassemblyHandler(2) ──→ FileSystemSink
//!                                     └─────────┘ ←── ArtifactWritten / ReassemblyAborted
//!                                          │
//!                                          └──CriticalError──→ dead-letter monitor
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Open and lock the output directory
//! 3. Subscribe every consumer before any producer starts
//! 4. Spawn reassembly (one handler, or partitioned workers)
//! 5. Spawn the page-view logger and source, if enabled
//!
//! Shutdown drops partially received files; only complete files are ever
//! written.

pub mod container;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ap_01_page_views::{PageViewError, PageViewLogger, PageViewSource};
use ap_02_chunk_reassembly::{
    chunk_events, ChunkingError, FileSystemSink, LockError, PartitionedReassembly,
    ReassemblyEngine, ReassemblyHandler, SystemTimeSource,
};
use parking_lot::Mutex;
use pipeline_telemetry::encode_metrics;
use shared_bus::{EventFilter, EventPublisher, EventTopic, InMemoryEventBus, PipelineEvent};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use container::{ConfigError, PipelineConfig};

/// How long shutdown waits for tasks to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Runtime startup errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot use output directory: {0}")]
    OutputDir(#[from] LockError),

    #[error("Cannot start page views: {0}")]
    PageViews(#[from] PageViewError),

    #[error("Runtime already started")]
    AlreadyStarted,
}

/// The pipeline runtime orchestrating all subsystems.
pub struct PipelineRuntime {
    config: PipelineConfig,
    run_id: Uuid,
    bus: Arc<InMemoryEventBus>,
    logger: PageViewLogger,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl PipelineRuntime {
    pub fn new(config: PipelineConfig) -> Self {
        let bus = Arc::new(InMemoryEventBus::with_capacity(config.bus_capacity.max(1)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            run_id: Uuid::new_v4(),
            bus,
            logger: PageViewLogger::new(),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Start every enabled subsystem.
    pub async fn start(&self) -> Result<(), RuntimeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyStarted);
        }

        info!("===========================================");
        info!("  Analytics Pipeline Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("  Run: {}", self.run_id);
        info!("===========================================");

        self.config.validate()?;
        let sink = Arc::new(FileSystemSink::open(&self.config.output_dir)?);

        // Page-view parts are built before anything is spawned so a bad
        // configuration leaves no tasks behind.
        let source = if self.config.page_views_enabled {
            Some(PageViewSource::new(&self.config.page_views, self.publisher())?)
        } else {
            None
        };

        self.start_dead_letter_monitor();
        self.start_reassembly(sink);
        if let Some(source) = source {
            self.start_page_views(source);
        }

        info!("Output Dir: {:?}", self.config.output_dir);
        info!(
            workers = self.config.reassembly.worker_count,
            page_views = self.config.page_views_enabled,
            "All subsystems running"
        );
        Ok(())
    }

    fn start_reassembly(&self, sink: Arc<FileSystemSink>) {
        let subscription = self
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::FileChunks]));
        let shutdown = self.shutdown_rx.clone();

        let task = if self.config.reassembly.worker_count > 1 {
            let workers = PartitionedReassembly::spawn(
                self.config.reassembly.clone(),
                sink,
                SystemTimeSource,
                self.publisher(),
                shutdown.clone(),
            );
            tokio::spawn(workers.run(subscription, shutdown))
        } else {
            let engine = ReassemblyEngine::new(sink, self.config.reassembly.clone());
            let handler = ReassemblyHandler::new(engine, self.publisher());
            tokio::spawn(handler.run(subscription, shutdown))
        };
        self.tasks.lock().push(task);
    }

    fn start_page_views(&self, source: PageViewSource) {
        let stream = self
            .bus
            .event_stream(EventFilter::topics(vec![EventTopic::PageViews]));
        let logger = self.logger.clone();

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(logger.run(stream, self.shutdown_rx.clone())));
        tasks.push(tokio::spawn(source.run(self.shutdown_rx.clone())));
    }

    fn start_dead_letter_monitor(&self) {
        let mut subscription = self
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::DeadLetterQueue]));
        let mut shutdown = self.shutdown_rx.clone();

        self.tasks.lock().push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    event = subscription.recv() => match event {
                        Some(PipelineEvent::CriticalError { subsystem, error }) => {
                            error!("[{}] ❌ Critical: {}", subsystem.tag(), error);
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
        }));
    }

    /// Split `data` and publish it as chunks keyed by `key`.
    ///
    /// Returns the number of chunks published. The artifact lands in the
    /// output directory as `<key><suffix>`.
    pub async fn publish_file(&self, key: &str, data: &[u8]) -> Result<usize, ChunkingError> {
        let events = chunk_events(key, data, self.config.chunk_size)?;
        let count = events.len();

        for event in events {
            self.bus.publish(event).await;
        }

        info!(key = %key, bytes = data.len(), chunks = count, "Published file as chunks");
        Ok(count)
    }

    /// Signal every task to stop and wait for them, bounded by a grace period.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            for task in tasks {
                if let Err(e) = task.await {
                    error!("Task failed during shutdown: {}", e);
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!("Tasks still running after {:?}; exiting anyway", SHUTDOWN_GRACE);
        }

        for (page, count) in self.logger.counts() {
            info!(page = %page, count, "Page views");
        }
        match encode_metrics() {
            Ok(metrics) => debug!("Final metrics:\n{}", metrics),
            Err(e) => warn!("Could not encode metrics: {}", e),
        }

        info!("Shutdown complete");
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.bus)
    }

    fn publisher(&self) -> Arc<dyn EventPublisher> {
        self.bus.clone()
    }

    /// Running page counts seen by the logger.
    pub fn page_view_logger(&self) -> &PageViewLogger {
        &self.logger
    }
}
