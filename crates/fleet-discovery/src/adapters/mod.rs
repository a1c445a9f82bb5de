//! # Adapters
//!
//! Concrete implementations of the outbound ports that need nothing beyond
//! the core dependencies:
//!
//! - `network`: in-process transport and advertiser ([`LocalNetwork`])
//! - `oracles`: fixture staking and external-IP oracles
//! - `publisher`: tracing, no-op and in-memory event sinks
//! - `storage`: in-memory key/value store
//! - `time`: system clock
//!
//! The QUIC transport lives in [`crate::transport`] behind the `quic` feature.

pub mod network;
pub mod oracles;
pub mod publisher;
pub mod storage;
pub mod time;

pub use network::LocalNetwork;
pub use oracles::{FailingAddressOracle, FixedAddressOracle, StaticStakingOracle};
pub use publisher::{InMemoryEventPublisher, NoOpEventPublisher, TracingEventPublisher};
pub use storage::InMemoryKeyValueStore;
pub use time::SystemTimeSource;
