//! # Worker Fleet Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── benchmarks/       # Registry and responder hot paths
//! │   └── fleet.rs
//! │
//! └── integration/      # Cross-component scenarios
//!     ├── fleet_learning.rs
//!     └── bonding_startup.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p fleet-tests
//!
//! # By category
//! cargo test -p fleet-tests integration::fleet_learning::
//! cargo test -p fleet-tests integration::bonding_startup::
//!
//! # Benchmarks
//! cargo bench -p fleet-tests
//! ```

#![allow(dead_code)]

pub mod benchmarks;
pub mod integration;
