//! Flows that cross crate boundaries: producers publish on the shared bus,
//! subsystem handlers consume, and results are checked where they land.

pub mod page_view_flows;
pub mod reassembly_flows;
