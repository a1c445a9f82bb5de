//! In-process fleet network.
//!
//! Routes fleet requests to responders registered at socket addresses in
//! the same process. Every exchange is encoded to JSON and back so the wire
//! format is exercised exactly as over QUIC.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::domain::{
    FleetRequest, FleetResponse, SocketAddr, TeacherResponse, TransportError,
};
use crate::ports::{FleetAdvertiser, FleetServingApi, PeerTransport};

#[derive(Default)]
struct Inner {
    endpoints: RwLock<HashMap<SocketAddr, Arc<dyn FleetServingApi>>>,
    requests: RwLock<HashMap<SocketAddr, usize>>,
    total: AtomicUsize,
}

/// In-memory transport and advertiser shared by a set of local workers.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    inner: Arc<Inner>,
    latency: Duration,
}

impl LocalNetwork {
    /// Network with instantaneous delivery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Network that delays every answer by `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Serve `responder` at `address`, replacing any previous one.
    pub fn register(&self, address: SocketAddr, responder: Arc<dyn FleetServingApi>) {
        self.inner.endpoints.write().insert(address, responder);
    }

    /// Stop serving at `address`.
    pub fn withdraw(&self, address: &SocketAddr) {
        self.inner.endpoints.write().remove(address);
    }

    /// Whether something is served at `address`.
    pub fn is_registered(&self, address: &SocketAddr) -> bool {
        self.inner.endpoints.read().contains_key(address)
    }

    /// Requests sent so far to any address.
    pub fn request_count(&self) -> usize {
        self.inner.total.load(Ordering::SeqCst)
    }

    /// Requests sent so far to `address`.
    pub fn requests_to(&self, address: &SocketAddr) -> usize {
        self.inner
            .requests
            .read()
            .get(address)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PeerTransport for LocalNetwork {
    async fn request_fleet(
        &self,
        address: SocketAddr,
        request: FleetRequest,
    ) -> Result<TeacherResponse, TransportError> {
        self.inner.total.fetch_add(1, Ordering::SeqCst);
        *self.inner.requests.write().entry(address).or_insert(0) += 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let responder = self
            .inner
            .endpoints
            .read()
            .get(&address)
            .cloned()
            .ok_or_else(|| TransportError::Unreachable {
                address,
                reason: "connection refused".into(),
            })?;

        let encoded_request =
            serde_json::to_vec(&request).map_err(|e| TransportError::Malformed(e.to_string()))?;
        let request: FleetRequest = serde_json::from_slice(&encoded_request)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;

        let answer = responder.answer(&request);
        let encoded =
            serde_json::to_vec(&answer).map_err(|e| TransportError::Malformed(e.to_string()))?;
        let response: FleetResponse =
            serde_json::from_slice(&encoded).map_err(|e| TransportError::Malformed(e.to_string()))?;

        debug!(addr = %address, peers = response.peers.len(), "Local fleet exchange");
        Ok(TeacherResponse {
            response,
            observed_certificate: Some(responder.tls_certificate()),
            received_at: None,
        })
    }
}

impl FleetAdvertiser for LocalNetwork {
    fn advertise(
        &self,
        address: SocketAddr,
        responder: Arc<dyn FleetServingApi>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        self.register(address, responder);
        let network = self.clone();
        tokio::spawn(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
            network.withdraw(&address);
        });
        Ok(())
    }
}
