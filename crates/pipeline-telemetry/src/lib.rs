//! # Pipeline Telemetry
//!
//! Logging and metrics shared by every pipeline crate.
//!
//! - `tracing` subscriber with an `EnvFilter` and pretty or JSON output
//! - Prometheus collectors in a process-wide [`metrics::REGISTRY`]
//! - `log_chunk_event!` / `log_artifact_event!` for keyed log lines
//!
//! ```rust,ignore
//! let _telemetry = pipeline_telemetry::init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment
//!
//! | Variable | Default | |
//! |----------|---------|-|
//! | `AP_SERVICE_NAME` | `analytics-pipeline` | Name on the startup line |
//! | `AP_LOG_LEVEL` | `info` | Filter directive, `RUST_LOG` wins if set |
//! | `AP_JSON_LOGS` | `false`, `true` in containers | JSON lines |
//! | `AP_CONSOLE_OUTPUT` | `true` | `false` silences logs |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::{LogFormat, TelemetryConfig};
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, ARTIFACTS_WRITTEN, ARTIFACT_BYTES,
    CHUNKS_RECEIVED, DECODE_ERRORS, PAGE_VIEWS_CONSUMED, PAGE_VIEWS_PUBLISHED,
    PENDING_ACCUMULATORS, REASSEMBLY_EVICTIONS, SEQUENCE_ANOMALIES, SINK_FAILURES,
    SINK_WRITE_DURATION, SUBSYSTEM_ERRORS,
};
pub use tracing_setup::{init_tracing, TracingGuard};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Tracing subscriber setup failed: {0}")]
    TracerInit(String),

    #[error("Metrics setup failed: {0}")]
    MetricsInit(String),

    #[error("Invalid telemetry configuration: {0}")]
    Config(String),
}

/// Register metrics, then install the global subscriber.
///
/// Hold the returned guard until the process exits.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    let tracing = init_tracing(&config)?;

    tracing::debug!(collectors = metrics.families(), "Metrics registered");

    Ok(TelemetryGuard {
        _tracing: tracing,
        _metrics: metrics,
    })
}

pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Telemetry shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_installs_once() {
        let config = TelemetryConfig {
            format: LogFormat::Off,
            ..Default::default()
        };
        let _guard = init_telemetry(config.clone()).unwrap();
        assert!(matches!(
            init_telemetry(config),
            Err(TelemetryError::TracerInit(_))
        ));
    }
}
