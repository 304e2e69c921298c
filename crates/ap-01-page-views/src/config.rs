//! Configuration for Page Views Subsystem

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Synthetic page-view configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageViewConfig {
    /// Time between two emitted events (milliseconds)
    pub interval_ms: u64,
    /// User ids to pick from
    pub users: Vec<String>,
    /// Page names to pick from
    pub pages: Vec<String>,
    /// Duration reported for a short visit (milliseconds)
    pub short_duration_ms: u64,
    /// Duration reported for a long visit (milliseconds)
    pub long_duration_ms: u64,
}

impl Default for PageViewConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            users: ["Anna", "Toby", "Lucy", "Mike"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            pages: ["blog", "about", "login"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            short_duration_ms: 10,
            long_duration_ms: 1000,
        }
    }
}

impl PageViewConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
