//! # Fleet Discovery
//!
//! Fleet learning, TLS certificate pinning and staking-bond verification
//! for the worker nodes of a decentralized re-encryption network.
//!
//! Every worker keeps a registry of the other workers it knows. It
//! periodically asks one of them (the "teacher") what it knows, validates
//! each announced peer, pins each peer's certificate on first sight, and
//! merges the survivors. Before participating, a worker may have to prove
//! that it is bonded to a staking account.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** identities, records, merge order, selection, validation, bonding states
//! - **Ports Layer:** trait definitions for transport, oracles, storage, events and time
//! - **Service Layer:** learner, responder, certificate store, bonding gate, self-addressing
//! - **Adapters Layer:** in-memory and fixture implementations of the ports
//! - **Transport Layer:** QUIC (feature `quic`)
//!
//! ## Example
//!
//! ```rust
//! use fleet_discovery::{
//!     fingerprint_of, IpAddr, PeerIdentity, PeerRecord, PeerRegistry, SocketAddr, Timestamp,
//! };
//!
//! let registry = PeerRegistry::new();
//! let peer = PeerRecord::new(
//!     PeerIdentity::derive(b"worker public key"),
//!     SocketAddr::new(IpAddr::v4(45, 76, 1, 1), 9151),
//!     fingerprint_of(b"worker certificate"),
//!     Timestamp::new(1000),
//! );
//!
//! let report = registry.merge(vec![peer.clone()]);
//! assert_eq!(report.inserted.len(), 1);
//!
//! // Merging the same record again changes nothing.
//! assert!(registry.merge(vec![peer]).is_empty());
//! assert_eq!(registry.fleet_state().version, 1);
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// =============================================================================
// FEATURE-GATED MODULES
// =============================================================================

/// Transport layer (QUIC)
/// Requires feature: `quic`
#[cfg(feature = "quic")]
pub mod transport;

/// Test utilities (ManualTimeSource, TestWorker, fixtures)
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// =============================================================================
// RE-EXPORTS
// =============================================================================

// Domain entities
pub use domain::{
    fingerprint_of, BondObservation, BondingConfig, BondingState, BondingStatus, Fingerprint,
    FleetEvent, FleetRequest, FleetResponse, FleetState, IpAddr, LearningConfig, LocalNode,
    OperatingMode, PeerAnnouncement, PeerIdentity, PeerRecord, PeerRegistry, PeerStatus,
    SocketAddr, TeacherResponse, Timestamp,
};

// Errors
pub use domain::{
    AddressResolutionError, BondingTransitionError, IdentityError, LearnError, OracleError,
    RejectReason, StoreError, TransportError,
};

// Port traits
pub use ports::{
    ExternalAddressOracle, FleetAdvertiser, FleetEventPublisher, FleetLearningApi,
    FleetServingApi, KeyValueStore, PeerTransport, StakingOracle, TimeSource,
};

// Services
pub use service::{
    resolve_advertised_host, AddressRequirement, AdvertisedHost, BondingVerifier,
    CertificateStore, FleetContext, FleetResponder, LearnResult, NodeLearner, RoundOutcome,
};

// Adapters
pub use adapters::{InMemoryKeyValueStore, LocalNetwork, SystemTimeSource, TracingEventPublisher};

#[cfg(feature = "quic")]
pub use transport::{NodeTlsMaterial, QuicConfig, QuicFleetServer, QuicPeerTransport};
