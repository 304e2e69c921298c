//! Random page-view generation.

use rand::seq::SliceRandom;
use rand::Rng;
use shared_types::PageViewEvent;

use super::errors::PageViewError;
use crate::config::PageViewConfig;

/// Picks a random user and page, and a short or long duration with even odds.
#[derive(Debug, Clone)]
pub struct PageViewGenerator {
    users: Vec<String>,
    pages: Vec<String>,
    short_duration_ms: u64,
    long_duration_ms: u64,
}

impl PageViewGenerator {
    pub fn new(config: &PageViewConfig) -> Result<Self, PageViewError> {
        if config.users.is_empty() {
            return Err(PageViewError::EmptyPool("users"));
        }
        if config.pages.is_empty() {
            return Err(PageViewError::EmptyPool("pages"));
        }

        Ok(Self {
            users: config.users.clone(),
            pages: config.pages.clone(),
            short_duration_ms: config.short_duration_ms,
            long_duration_ms: config.long_duration_ms,
        })
    }

    pub fn next_event<R: Rng + ?Sized>(&self, rng: &mut R) -> PageViewEvent {
        // Pools are non-empty, checked in `new`.
        let user = self.users.choose(rng).cloned().unwrap_or_default();
        let page = self.pages.choose(rng).cloned().unwrap_or_default();
        let duration = if rng.gen_bool(0.5) {
            self.short_duration_ms
        } else {
            self.long_duration_ms
        };

        PageViewEvent::new(user, page, duration)
    }
}
