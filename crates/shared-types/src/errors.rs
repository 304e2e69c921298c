//! # Error Types
//!
//! Errors raised while moving payloads across the wire.

use thiserror::Error;

/// Errors decoding or encoding a wire payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Payload is not valid JSON for the expected type.
    #[error("Malformed payload: {0}")]
    Malformed(String),
}
