//! # Page View Source
//!
//! Publishes one random `PageViewed` event per interval, keyed by user id.
//! The first event goes out one full interval after start.

use std::sync::Arc;
use std::time::Duration;

use pipeline_telemetry::PAGE_VIEWS_PUBLISHED;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared_bus::{EventPublisher, PipelineEvent};
use shared_types::PageViewEvent;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::PageViewConfig;
use crate::domain::{PageViewError, PageViewGenerator};

pub struct PageViewSource {
    generator: PageViewGenerator,
    publisher: Arc<dyn EventPublisher>,
    interval: Duration,
    rng: StdRng,
}

impl PageViewSource {
    pub fn new(
        config: &PageViewConfig,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, PageViewError> {
        Ok(Self {
            generator: PageViewGenerator::new(config)?,
            publisher,
            interval: config.interval(),
            rng: StdRng::from_entropy(),
        })
    }

    /// Replace the entropy-seeded RNG with a deterministic one.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Generate and publish a single event.
    pub async fn publish_once(&mut self) -> PageViewEvent {
        let event = self.generator.next_event(&mut self.rng);
        let receivers = self
            .publisher
            .publish(PipelineEvent::PageViewed {
                key: event.user_id.clone(),
                event: event.clone(),
            })
            .await;

        PAGE_VIEWS_PUBLISHED.inc();
        info!(
            user = %event.user_id,
            page = %event.page,
            duration = event.duration,
            "[ap-01] sent: {:?}",
            event
        );
        if receivers == 0 {
            debug!("[ap-01] No subscribers for page views");
        }
        event
    }

    /// Emit until shutdown is signalled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "[ap-01] Page view source started");

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("[ap-01] Page view source stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.publish_once().await;
                }
            }
        }
    }
}
