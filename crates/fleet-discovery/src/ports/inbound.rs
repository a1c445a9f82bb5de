//! # Driving Ports (Inbound API)
//!
//! The two capability sets of a worker: learning from others and answering
//! others.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    FleetRequest, FleetResponse, FleetState, LearnError, PeerRecord, SocketAddr,
};
use crate::service::{LearnResult, RoundOutcome};

/// Outbound learning capability.
///
/// # Example
///
/// ```rust,ignore
/// use fleet_discovery::ports::FleetLearningApi;
///
/// async fn bootstrap<L: FleetLearningApi>(learner: &L) {
///     let outcome = learner.learn_now().await;
///     println!("{outcome:?}, {} peers known", learner.known_peers().len());
/// }
/// ```
#[async_trait]
pub trait FleetLearningApi: Send + Sync {
    /// Run one learning round now.
    async fn learn_now(&self) -> RoundOutcome;

    /// Ask one known peer what it knows.
    async fn learn_from_teacher(&self, teacher: PeerRecord) -> Result<LearnResult, LearnError>;

    /// Ask a seed address whose identity is not yet known.
    async fn learn_from_seed(&self, address: SocketAddr) -> Result<LearnResult, LearnError>;

    /// Resolve once at least `count` peers are known, or `false` on timeout.
    async fn wait_for_peers(&self, count: usize, timeout: Duration) -> bool;

    /// Every known peer.
    fn known_peers(&self) -> Vec<PeerRecord>;

    /// Current fleet state.
    fn fleet_state(&self) -> FleetState;
}

/// Inbound "what do you know" capability.
pub trait FleetServingApi: Send + Sync {
    /// Answer one fleet request. Read-only.
    fn answer(&self, request: &FleetRequest) -> FleetResponse;

    /// DER certificate presented to clients during the TLS handshake.
    fn tls_certificate(&self) -> Vec<u8>;
}
