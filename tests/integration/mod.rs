//! Integration test suite for hbs-loader
//!
//! End-to-end tests that drive the public loader API and the `hbs-loader`
//! binary against template projects laid out in temporary directories.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **resolution**: fixed-point compilation, search order, helper handling
//! - **cache_behavior**: on-disk module cache and shared build state
//! - **cli**: the `compile` and `cache` commands

mod cache_behavior;
mod cli;
mod resolution;
