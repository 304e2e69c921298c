//! # Analytics Pipeline Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # Cross-crate flows over the shared bus
//! │   ├── reassembly_flows.rs
//! │   └── page_view_flows.rs
//! └── benches/           # criterion benchmarks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ap-tests
//! cargo test -p ap-tests integration::reassembly_flows
//! cargo bench -p ap-tests
//! ```

pub mod integration;
