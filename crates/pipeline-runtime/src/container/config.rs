//! # Pipeline Configuration
//!
//! Unified configuration for both subsystems and the runtime itself.
//!
//! Every field has a default; environment variables override them:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AP_OUTPUT_DIR` | `./artifacts` | Where reassembled files are written |
//! | `AP_PAGE_VIEWS_ENABLED` | `true` | Run the page-view source and logger |
//! | `AP_PAGE_VIEW_INTERVAL_MS` | `1000` | Time between synthetic page views |
//! | `AP_SEND_FILE` | unset | File to split and publish as chunks at startup |
//! | `AP_CHUNK_SIZE` | `65536` | Chunk size used for `AP_SEND_FILE` |
//! | `AP_WORKERS` | `1` | Reassembly worker tasks |
//! | `AP_MAX_ARTIFACT_BYTES` | `67108864` | Largest file a key may accumulate |
//! | `AP_MAX_PENDING_KEYS` | `1024` | Concurrent partial files per worker |
//! | `AP_IDLE_TIMEOUT_SECS` | `300` | Idle time before a partial file is dropped |
//! | `AP_BUS_CAPACITY` | `1000` | Event bus buffer per subscriber |

use std::path::PathBuf;
use std::str::FromStr;

use ap_01_page_views::PageViewConfig;
use ap_02_chunk_reassembly::ReassemblyConfig;
use thiserror::Error;

/// Default chunk size for files published at startup.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Complete pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Output directory for reassembled artifacts.
    pub output_dir: PathBuf,
    /// Whether the page-view source and logger run.
    pub page_views_enabled: bool,
    /// Optional file to publish as chunks once the pipeline is up.
    pub send_file: Option<PathBuf>,
    /// Chunk size for `send_file`.
    pub chunk_size: usize,
    /// Event bus capacity.
    pub bus_capacity: usize,
    /// Page views subsystem configuration.
    pub page_views: PageViewConfig,
    /// Chunk reassembly subsystem configuration.
    pub reassembly: ReassemblyConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./artifacts"),
            page_views_enabled: true,
            send_file: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            bus_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
            page_views: PageViewConfig::default(),
            reassembly: ReassemblyConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("artifact suffix must not be empty")]
    EmptySuffix,

    #[error("page views need at least one {0}")]
    EmptyPool(&'static str),
}

impl PipelineConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("AP_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(enabled) = parse_bool(&lookup, "AP_PAGE_VIEWS_ENABLED")? {
            config.page_views_enabled = enabled;
        }
        if let Some(interval) = parse(&lookup, "AP_PAGE_VIEW_INTERVAL_MS")? {
            config.page_views.interval_ms = interval;
        }
        config.send_file = lookup("AP_SEND_FILE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        if let Some(size) = parse(&lookup, "AP_CHUNK_SIZE")? {
            config.chunk_size = size;
        }
        if let Some(workers) = parse(&lookup, "AP_WORKERS")? {
            config.reassembly.worker_count = workers;
        }
        if let Some(max) = parse(&lookup, "AP_MAX_ARTIFACT_BYTES")? {
            config.reassembly.max_artifact_bytes = max;
        }
        if let Some(max) = parse(&lookup, "AP_MAX_PENDING_KEYS")? {
            config.reassembly.max_pending_keys = max;
        }
        if let Some(secs) = parse(&lookup, "AP_IDLE_TIMEOUT_SECS")? {
            config.reassembly.idle_timeout_secs = secs;
        }
        if let Some(capacity) = parse(&lookup, "AP_BUS_CAPACITY")? {
            config.bus_capacity = capacity;
        }

        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reassembly.worker_count == 0 {
            return Err(ConfigError::Zero("worker count"));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Zero("chunk size"));
        }
        if self.bus_capacity == 0 {
            return Err(ConfigError::Zero("bus capacity"));
        }
        if self.reassembly.max_artifact_bytes == 0 {
            return Err(ConfigError::Zero("max artifact bytes"));
        }
        if self.reassembly.max_pending_keys == 0 {
            return Err(ConfigError::Zero("max pending keys"));
        }
        if self.reassembly.artifact_suffix.is_empty() {
            return Err(ConfigError::EmptySuffix);
        }
        if self.page_views_enabled {
            if self.page_views.interval_ms == 0 {
                return Err(ConfigError::Zero("page view interval"));
            }
            if self.page_views.users.is_empty() {
                return Err(ConfigError::EmptyPool("user"));
            }
            if self.page_views.pages.is_empty() {
                return Err(ConfigError::EmptyPool("page"));
            }
        }
        Ok(())
    }
}

fn parse<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

fn parse_bool<F>(lookup: &F, var: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue { var, value }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("./artifacts"));
        assert!(config.page_views_enabled);
        assert_eq!(config.send_file, None);
        assert_eq!(config.chunk_size, 64 * 1024);
        assert_eq!(config.reassembly.worker_count, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("AP_OUTPUT_DIR", "/tmp/out"),
            ("AP_PAGE_VIEWS_ENABLED", "false"),
            ("AP_SEND_FILE", "report.bin"),
            ("AP_CHUNK_SIZE", "1024"),
            ("AP_WORKERS", "4"),
            ("AP_IDLE_TIMEOUT_SECS", " 60 "),
        ]))
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert!(!config.page_views_enabled);
        assert_eq!(config.send_file, Some(PathBuf::from("report.bin")));
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.reassembly.worker_count, 4);
        assert_eq!(config.reassembly.idle_timeout_secs, 60);
    }

    #[test]
    fn test_invalid_values() {
        let err = PipelineConfig::from_lookup(lookup(&[("AP_WORKERS", "many")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "AP_WORKERS",
                value: "many".to_string()
            }
        );

        let err = PipelineConfig::from_lookup(lookup(&[("AP_PAGE_VIEWS_ENABLED", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "AP_PAGE_VIEWS_ENABLED", .. }));
    }

    #[test]
    fn test_validate() {
        let mut config = PipelineConfig::default();
        config.reassembly.worker_count = 0;
        assert_eq!(config.validate(), Err(ConfigError::Zero("worker count")));

        let mut config = PipelineConfig::default();
        config.chunk_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::Zero("chunk size")));

        let mut config = PipelineConfig::default();
        config.reassembly.artifact_suffix.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptySuffix));

        let mut config = PipelineConfig::default();
        config.page_views.pages.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyPool("page")));

        // Pools are irrelevant when page views are off.
        config.page_views_enabled = false;
        assert!(config.validate().is_ok());
    }
}
