//! # Page Views Subsystem
//!
//! Synthetic traffic for the pipeline.
//!
//! - `PageViewSource` publishes one random page view per second, keyed by
//!   user id (Anna, Toby, Lucy, Mike viewing blog, about, login; a visit
//!   lasts 10 ms or 1000 ms with even odds).
//! - `PageViewLogger` logs every page view it receives and keeps running
//!   per-page counts.
//!
//! Neither side affects chunk reassembly; they only share the bus.

pub mod application;
pub mod config;
pub mod domain;

pub use application::{PageViewLogger, PageViewSource};
pub use config::PageViewConfig;
pub use domain::{PageCounts, PageViewError, PageViewGenerator};
