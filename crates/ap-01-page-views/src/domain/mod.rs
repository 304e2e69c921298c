//! Domain module for Page Views

pub mod errors;
pub mod generator;
pub mod tally;

pub use errors::*;
pub use generator::*;
pub use tally::*;
