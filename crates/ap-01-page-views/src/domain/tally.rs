//! Running view counts per page.

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct PageCounts {
    counts: HashMap<String, u64>,
}

impl PageCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one view of `page`, returning the new count.
    pub fn record(&mut self, page: &str) -> u64 {
        let count = self.counts.entry(page.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn get(&self, page: &str) -> u64 {
        self.counts.get(page).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counts.clone()
    }
}
