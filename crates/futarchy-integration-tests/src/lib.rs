//! Integration test crate for the futarchy market stack.
//!
//! This crate has no library code. It only contains integration tests that
//! exercise oracle, pool, band, feed and market behaviour across the
//! workspace crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p futarchy-integration-tests
//! ```
