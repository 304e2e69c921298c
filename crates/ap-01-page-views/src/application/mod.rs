//! Application layer: the periodic source and the logging consumer.

pub mod logger;
pub mod source;

pub use logger::PageViewLogger;
pub use source::PageViewSource;
