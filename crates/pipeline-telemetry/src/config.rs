//! Telemetry configuration.

use std::env;

/// How log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored console output.
    Pretty,
    /// One JSON object per line.
    Json,
    /// Nothing is written; metrics still work.
    Off,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Attached to the startup line so several processes can share a sink.
    pub service_name: String,
    /// `EnvFilter` directive, e.g. `info` or `ap_02_chunk_reassembly=debug`.
    pub log_level: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "analytics-pipeline".to_string(),
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl TelemetryConfig {
    /// Read `AP_SERVICE_NAME`, `AP_LOG_LEVEL` (falling back to `RUST_LOG`),
    /// `AP_CONSOLE_OUTPUT` and `AP_JSON_LOGS`.
    ///
    /// JSON is the default inside containers (`KUBERNETES_SERVICE_HOST` or
    /// `DOCKER_CONTAINER` set).
    pub fn from_env() -> Self {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let in_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        let console = flag(lookup("AP_CONSOLE_OUTPUT")).unwrap_or(true);
        let json = flag(lookup("AP_JSON_LOGS")).unwrap_or(in_container);
        let format = match (console, json) {
            (false, _) => LogFormat::Off,
            (true, true) => LogFormat::Json,
            (true, false) => LogFormat::Pretty,
        };

        Self {
            service_name: lookup("AP_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: lookup("AP_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            format,
        }
    }
}

/// Unrecognised values count as unset.
fn flag(value: Option<String>) -> Option<bool> {
    match value?.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
