//! # Driven Ports (Outbound SPI)
//!
//! These are the interfaces the fleet core **requires** the host application
//! to implement: the network, the staking chain, the external-IP oracle,
//! durable storage, event sinks and the clock.
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync`; one instance is shared by the
//! learning loop, the responder and the startup sequence.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::{
    BondObservation, FleetEvent, FleetRequest, IpAddr, OracleError, PeerIdentity, SocketAddr,
    StoreError, TeacherResponse, Timestamp, TransportError,
};

use super::inbound::FleetServingApi;

/// Abstract interface for asking another worker what it knows.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct HttpPeerTransport { client: reqwest::Client }
///
/// #[async_trait]
/// impl PeerTransport for HttpPeerTransport {
///     async fn request_fleet(&self, address: SocketAddr, request: FleetRequest)
///         -> Result<TeacherResponse, TransportError> {
///         // POST the request as JSON, decode the FleetResponse
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Send one fleet request and wait for the answer.
    ///
    /// Implementations should report the certificate presented during the
    /// TLS handshake in [`TeacherResponse::observed_certificate`] when they
    /// have one. The caller applies its own timeout.
    async fn request_fleet(
        &self,
        address: SocketAddr,
        request: FleetRequest,
    ) -> Result<TeacherResponse, TransportError>;
}

/// Makes the local responder reachable by other workers.
pub trait FleetAdvertiser: Send + Sync {
    /// Start serving `responder` at `address` until `shutdown` flips to `true`.
    fn advertise(
        &self,
        address: SocketAddr,
        responder: Arc<dyn FleetServingApi>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), TransportError>;
}

/// Queryable view of the staking registry on chain.
#[async_trait]
pub trait StakingOracle: Send + Sync {
    /// Current bond of `worker`.
    async fn is_worker_bonded(&self, worker: &PeerIdentity)
        -> Result<BondObservation, OracleError>;
}

/// "What is my public IP" service.
#[async_trait]
pub trait ExternalAddressOracle: Send + Sync {
    /// The IP address other hosts see this node connecting from.
    async fn external_ip(&self) -> Result<IpAddr, OracleError>;
}

/// Byte-oriented durable storage.
///
/// `put_if_absent` must be atomic: two concurrent callers offering values
/// for the same key see exactly one winner.
pub trait KeyValueStore: Send + Sync {
    /// Read one value.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert or overwrite one value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Insert `value` unless `key` exists.
    ///
    /// Returns `None` when inserted, or the existing value.
    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Every entry whose key starts with `prefix`, in key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
}

/// Sink for [`FleetEvent`]s.
pub trait FleetEventPublisher: Send + Sync {
    /// Publish one event. Must not block.
    fn publish(&self, event: FleetEvent);
}

/// Abstract interface for getting current time.
///
/// Allows deterministic testing by injecting a controllable clock.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}
