//! Domain module for Chunk Reassembly
//!
//! Contains the chunk record, the per-key accumulator, outcomes, and errors.

pub mod accumulator;
pub mod errors;
pub mod outcome;
pub mod record;

pub use accumulator::*;
pub use errors::*;
pub use outcome::*;
pub use record::*;
