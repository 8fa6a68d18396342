//! Integration test crate for the liftgate gateway.
//!
//! This crate has no library code — it only contains integration tests
//! that exercise end-to-end bridging flows across the workspace crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p liftgate-integration-tests
//! ```
