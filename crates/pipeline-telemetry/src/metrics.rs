//! Prometheus metrics.
//!
//! Names are `ap_<area>_<what>[_unit]`. Every collector lives in [`REGISTRY`]
//! once [`register_metrics`] has run; before that they still count, they are
//! just not exported by [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

// Metric definitions are static and known-good; a failure here is a typo.
fn counter(name: &str, help: &str) -> Counter {
    Counter::new(name, help).expect("valid counter definition")
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    CounterVec::new(Opts::new(name, help), labels).expect("valid counter vec definition")
}

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ap-01

    pub static ref PAGE_VIEWS_PUBLISHED: Counter = counter(
        "ap_pageviews_published_total",
        "Page-view events published by the synthetic source",
    );

    /// Labelled by `page`.
    pub static ref PAGE_VIEWS_CONSUMED: CounterVec = counter_vec(
        "ap_pageviews_consumed_total",
        "Page-view events seen by the logger",
        &["page"],
    );

    // ap-02

    /// `outcome`: accumulated, completed, rejected.
    pub static ref CHUNKS_RECEIVED: CounterVec = counter_vec(
        "ap_reassembly_chunks_total",
        "Chunk records processed",
        &["outcome"],
    );

    pub static ref DECODE_ERRORS: Counter = counter(
        "ap_reassembly_decode_errors_total",
        "Chunk payloads that were not valid base64",
    );

    /// `kind`: total_changed, out_of_order, ordinal_exceeds_total, restarted.
    pub static ref SEQUENCE_ANOMALIES: CounterVec = counter_vec(
        "ap_reassembly_sequence_anomalies_total",
        "Keys reset because of an inconsistent chunk sequence",
        &["kind"],
    );

    pub static ref ARTIFACTS_WRITTEN: Counter = counter(
        "ap_reassembly_artifacts_written_total",
        "Reconstructed artifacts persisted",
    );

    pub static ref ARTIFACT_BYTES: Counter = counter(
        "ap_reassembly_artifact_bytes_total",
        "Bytes of reconstructed artifacts persisted",
    );

    /// Failed or timed-out writes. The key keeps its bytes for a retry.
    pub static ref SINK_FAILURES: Counter = counter(
        "ap_reassembly_sink_failures_total",
        "Artifact writes that failed or timed out",
    );

    /// 100µs doubling up to ~1.6s.
    pub static ref SINK_WRITE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ap_reassembly_sink_write_duration_seconds",
            "Time spent in a single artifact write",
        )
        .buckets(exponential_buckets(0.0001, 2.0, 15).expect("valid buckets")),
    )
    .expect("valid histogram definition");

    pub static ref PENDING_ACCUMULATORS: Gauge = Gauge::new(
        "ap_reassembly_pending_accumulators",
        "Keys holding a partial or unflushed file",
    )
    .expect("valid gauge definition");

    /// `reason`: idle, capacity.
    pub static ref REASSEMBLY_EVICTIONS: CounterVec = counter_vec(
        "ap_reassembly_evictions_total",
        "Accumulators dropped to bound memory",
        &["reason"],
    );

    // shared

    pub static ref SUBSYSTEM_ERRORS: CounterVec = counter_vec(
        "ap_subsystem_errors_total",
        "Errors by subsystem and type",
        &["subsystem", "error_type"],
    );
}

fn collectors() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(PAGE_VIEWS_PUBLISHED.clone()),
        Box::new(PAGE_VIEWS_CONSUMED.clone()),
        Box::new(CHUNKS_RECEIVED.clone()),
        Box::new(DECODE_ERRORS.clone()),
        Box::new(SEQUENCE_ANOMALIES.clone()),
        Box::new(ARTIFACTS_WRITTEN.clone()),
        Box::new(ARTIFACT_BYTES.clone()),
        Box::new(SINK_FAILURES.clone()),
        Box::new(SINK_WRITE_DURATION.clone()),
        Box::new(PENDING_ACCUMULATORS.clone()),
        Box::new(REASSEMBLY_EVICTIONS.clone()),
        Box::new(SUBSYSTEM_ERRORS.clone()),
    ]
}

/// Proof that the collectors are in [`REGISTRY`].
#[derive(Debug)]
pub struct MetricsHandle {
    families: usize,
}

impl MetricsHandle {
    /// Number of collectors registered.
    pub fn families(&self) -> usize {
        self.families
    }
}

/// Add every collector to [`REGISTRY`]. Safe to call repeatedly.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let collectors = collectors();
    let families = collectors.len();

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { families })
}

/// Render [`REGISTRY`] in the Prometheus text exposition format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Time the enclosing scope into a histogram.
///
/// ```rust,ignore
/// let _timer = time_histogram!(SINK_WRITE_DURATION);
/// ```
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $histogram.start_timer()
    };
}
