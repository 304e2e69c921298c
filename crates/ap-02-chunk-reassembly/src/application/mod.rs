//! Application layer for Chunk Reassembly

pub mod service;

pub use service::ReassemblyEngine;
