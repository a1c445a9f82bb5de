//! # Fleet Worker Runtime
//!
//! Configuration, logging and the startup sequence of a fleet worker.
//!
//! ## Modular Structure
//!
//! - `config` - TOML file plus `WORKER_*` environment overrides
//! - `adapters` - HTTP oracles, TLS material on disk, RocksDB storage
//! - `runtime` - startup sequence, background tasks and shutdown
//! - `wiring` - production adapters for each port
//! - `telemetry` - tracing subscriber
//!
//! ## Startup Sequence
//!
//! 1. Load and validate configuration
//! 2. Resolve the advertised host
//! 3. Wait for the worker to be bonded (unless federated-only)
//! 4. Restore known peers and certificate pins
//! 5. Serve fleet requests over QUIC
//! 6. Learn about the fleet (unless lonely)

pub mod adapters;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod telemetry;
pub mod wiring;

pub use config::{load_config, ConfigError, WorkerConfig};
pub use errors::StartupError;
pub use runtime::{Collaborators, RunningWorker, WorkerRuntime};
pub use wiring::build_runtime;
