//! # Page View Logger
//!
//! Logs every consumed page view and keeps running per-page counts.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use pipeline_telemetry::PAGE_VIEWS_CONSUMED;
use shared_bus::{EventStream, PipelineEvent};
use shared_types::PageViewEvent;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use crate::domain::PageCounts;

/// Cloning shares the counts.
#[derive(Clone, Default)]
pub struct PageViewLogger {
    counts: Arc<RwLock<PageCounts>>,
}

impl PageViewLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, key: &str, event: &PageViewEvent) {
        info!(key = %key, "[ap-01] Consumer: {:?}", event);
        PAGE_VIEWS_CONSUMED.with_label_values(&[event.page.as_str()]).inc();

        let count = self.counts.write().record(&event.page);
        debug!(page = %event.page, count, "[ap-01] Page count updated");
    }

    pub fn count(&self, page: &str) -> u64 {
        self.counts.read().get(page)
    }

    pub fn total(&self) -> u64 {
        self.counts.read().total()
    }

    pub fn counts(&self) -> HashMap<String, u64> {
        self.counts.read().snapshot()
    }

    /// Consume page views from `stream` until shutdown or the bus closes.
    pub async fn run(self, mut stream: EventStream, mut shutdown: watch::Receiver<bool>) {
        info!("[ap-01] Page view logger started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = stream.next() => match event {
                    Some(PipelineEvent::PageViewed { key, event }) => self.handle(&key, &event),
                    Some(_) => {}
                    None => break,
                },
            }
        }

        info!(total = self.total(), "[ap-01] Page view logger stopped");
    }
}
