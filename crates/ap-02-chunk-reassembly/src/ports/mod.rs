//! Ports module for Chunk Reassembly
//!
//! Defines inbound (API) and outbound (SPI) port traits.

pub mod inbound;
pub mod outbound;

pub use inbound::ReassemblyApi;
pub use outbound::{ArtifactSink, ManualTimeSource, SystemTimeSource, TimeSource};
