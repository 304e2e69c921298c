//! # Shared Types Crate
//!
//! Wire payloads exchanged between pipeline subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Wire Compatibility**: Field names follow the JSON contract used by the
//!   producers (`userId`, `totalPages`, ...), mapped with serde renames.
//! - **Key Outside Payload**: The message key (user id, file id) travels next
//!   to the payload, never inside it.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
