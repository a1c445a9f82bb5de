//! # Integration Tests
//!
//! End-to-end scenarios across the learner, responder, certificate store,
//! bonding gate and runtime.
//!
//! - `fleet_learning`: lonely mode, seeded teachers, trust conflicts, coalescing
//! - `bonding_startup`: bonding deadline and self-addressing failures at startup

pub mod bonding_startup;
pub mod fleet_learning;
