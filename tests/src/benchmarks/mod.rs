//! # Worker Fleet Benchmarks
//!
//! Hot paths of fleet learning, driven by `benches/fleet_benchmarks.rs`.

pub mod fleet;
