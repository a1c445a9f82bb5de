//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Ports (Inbound):** the learning and serving capabilities
//! - **Driven Ports (Outbound):** transport, oracles, storage, events, clock

pub mod inbound;
pub mod outbound;

pub use inbound::{FleetLearningApi, FleetServingApi};
pub use outbound::{
    ExternalAddressOracle, FleetAdvertiser, FleetEventPublisher, KeyValueStore, PeerTransport,
    StakingOracle, TimeSource,
};
