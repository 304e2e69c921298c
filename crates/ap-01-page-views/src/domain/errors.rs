//! Error types for Page Views

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageViewError {
    /// A generator needs at least one user and one page.
    #[error("Cannot generate page views: no {0} configured")]
    EmptyPool(&'static str),
}
