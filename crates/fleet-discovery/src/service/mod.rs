//! # Fleet Services
//!
//! Wires the domain to the ports:
//! - [`CertificateStore`]: trust-on-first-use pins over a key/value store
//! - [`FleetContext`]: the state one worker shares between its capabilities
//! - [`NodeLearner`]: outbound learning rounds and the background loop
//! - [`FleetResponder`]: inbound fleet requests
//! - [`BondingVerifier`]: staking bond gate
//! - [`resolve_advertised_host`]: self-addressing

// Semantic submodules
mod address;
mod bonding;
mod certificates;
mod context;
mod learner;
mod responder;

// Re-export public API
pub use address::{resolve_advertised_host, AddressRequirement, AddressSource, AdvertisedHost};
pub use bonding::BondingVerifier;
pub use certificates::{CertificateEntry, CertificateStore, PutOutcome, CERTIFICATE_PREFIX};
pub use context::{FleetContext, PEER_PREFIX};
pub use learner::{LearnResult, NodeLearner, RoundOutcome};
pub use responder::FleetResponder;
