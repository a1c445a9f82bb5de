//! # QUIC Transport Layer
//!
//! Fleet requests over quinn. One connection per exchange, one
//! bidirectional stream per request: the client writes a JSON
//! [`FleetRequest`] and finishes its side, the server answers with a JSON
//! [`FleetResponse`].
//!
//! ## Security Properties
//!
//! - TLS 1.3 with self-signed worker certificates
//! - The client reports the certificate observed in the handshake so the
//!   learner can compare it with the announced and pinned ones
//!
//! ## Reference
//!
//! - RFC 9000 (QUIC)
//! - RFC 9001 (QUIC-TLS)

mod config;
mod tls;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustls::pki_types::CertificateDer;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub use config::QuicConfig;
pub use tls::NodeTlsMaterial;

use crate::domain::{FleetRequest, FleetResponse, SocketAddr, TeacherResponse, TransportError};
use crate::ports::{FleetAdvertiser, FleetServingApi, PeerTransport};

/// TLS server name sent by clients. Certificates are not checked against it.
const SERVER_NAME: &str = "fleet-worker";

// =============================================================================
// CLIENT
// =============================================================================

/// Outbound fleet requests over QUIC.
pub struct QuicPeerTransport {
    endpoint: quinn::Endpoint,
    config: QuicConfig,
}

impl QuicPeerTransport {
    /// Bind an outbound-only endpoint.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Tls` if the client configuration cannot be
    /// built and `TransportError::Unreachable` if binding fails.
    pub fn bind(config: QuicConfig) -> Result<Self, TransportError> {
        let bind_addr = config.client_bind();
        let mut endpoint =
            quinn::Endpoint::client(bind_addr).map_err(|e| TransportError::Unreachable {
                address: bind_addr.into(),
                reason: format!("bind failed: {e}"),
            })?;
        endpoint.set_default_client_config(tls::client_config(&config)?);
        Ok(Self { endpoint, config })
    }

    async fn exchange(
        &self,
        address: SocketAddr,
        request: &FleetRequest,
    ) -> Result<TeacherResponse, TransportError> {
        let unreachable = |reason: String| TransportError::Unreachable { address, reason };

        let connecting = self
            .endpoint
            .connect(address.into(), SERVER_NAME)
            .map_err(|e| unreachable(e.to_string()))?;
        let connection = tokio::time::timeout(self.config.connect_timeout, connecting)
            .await
            .map_err(|_| TransportError::Timeout(address))?
            .map_err(|e| unreachable(e.to_string()))?;

        let observed = peer_certificate(&connection)
            .ok_or_else(|| TransportError::Tls("server presented no certificate".into()))?;

        let (mut send, mut recv) = connection
            .open_bi()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        let payload =
            serde_json::to_vec(request).map_err(|e| TransportError::Malformed(e.to_string()))?;
        send.write_all(&payload)
            .await
            .map_err(|e| unreachable(format!("send failed: {e}")))?;
        send.finish()
            .map_err(|e| unreachable(format!("send failed: {e}")))?;

        let bytes = recv
            .read_to_end(self.config.max_message_size)
            .await
            .map_err(|e| unreachable(format!("receive failed: {e}")))?;
        connection.close(0u32.into(), b"done");

        let response: FleetResponse =
            serde_json::from_slice(&bytes).map_err(|e| TransportError::Malformed(e.to_string()))?;
        debug!(addr = %address, peers = response.peers.len(), bytes = bytes.len(), "QUIC fleet exchange");

        Ok(TeacherResponse {
            response,
            observed_certificate: Some(observed),
            received_at: None,
        })
    }
}

#[async_trait]
impl PeerTransport for QuicPeerTransport {
    async fn request_fleet(
        &self,
        address: SocketAddr,
        request: FleetRequest,
    ) -> Result<TeacherResponse, TransportError> {
        self.exchange(address, &request).await
    }
}

fn peer_certificate(connection: &quinn::Connection) -> Option<Vec<u8>> {
    let identity = connection.peer_identity()?;
    let chain = identity.downcast::<Vec<CertificateDer<'static>>>().ok()?;
    chain.first().map(|cert| cert.to_vec())
}

// =============================================================================
// SERVER
// =============================================================================

/// Serves fleet requests over QUIC with the worker's TLS material.
pub struct QuicFleetServer {
    tls: NodeTlsMaterial,
    config: QuicConfig,
    local_addr: Mutex<Option<std::net::SocketAddr>>,
}

impl QuicFleetServer {
    /// Create a server (not yet bound).
    pub fn new(tls: NodeTlsMaterial, config: QuicConfig) -> Self {
        Self {
            tls,
            config,
            local_addr: Mutex::new(None),
        }
    }

    /// The certificate clients will observe.
    pub fn certificate_der(&self) -> &[u8] {
        self.tls.certificate_der()
    }

    /// Address actually bound, once advertising.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        *self.local_addr.lock()
    }
}

impl FleetAdvertiser for QuicFleetServer {
    fn advertise(
        &self,
        address: SocketAddr,
        responder: Arc<dyn FleetServingApi>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        let bind_addr = self.config.server_bind(address.port, address.ip.is_ipv6());
        let server_config = self.tls.server_config(&self.config)?;
        let endpoint = quinn::Endpoint::server(server_config, bind_addr).map_err(|e| {
            TransportError::Unreachable {
                address,
                reason: format!("failed to bind {bind_addr}: {e}"),
            }
        })?;
        let local = endpoint.local_addr().map_err(|e| TransportError::Unreachable {
            address,
            reason: e.to_string(),
        })?;
        *self.local_addr.lock() = Some(local);
        info!(advertised = %address, bound = %local, "Serving fleet requests over QUIC");

        let max_message_size = self.config.max_message_size;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    incoming = endpoint.accept() => match incoming {
                        Some(incoming) => {
                            tokio::spawn(serve_connection(incoming, responder.clone(), max_message_size));
                        }
                        None => break,
                    },
                    _ = shutdown.wait_for(|stop| *stop) => break,
                }
            }
            endpoint.close(0u32.into(), b"shutdown");
            endpoint.wait_idle().await;
            debug!(bound = %local, "QUIC fleet server stopped");
        });
        Ok(())
    }
}

async fn serve_connection(
    incoming: quinn::Incoming,
    responder: Arc<dyn FleetServingApi>,
    max_message_size: usize,
) {
    let connection = match incoming.await {
        Ok(connection) => connection,
        Err(error) => {
            debug!(%error, "QUIC handshake failed");
            return;
        }
    };
    let remote = connection.remote_address();

    while let Ok((mut send, mut recv)) = connection.accept_bi().await {
        let request = match recv.read_to_end(max_message_size).await {
            Ok(bytes) => serde_json::from_slice::<FleetRequest>(&bytes),
            Err(error) => {
                debug!(%remote, %error, "Failed to read fleet request");
                break;
            }
        };
        let request = match request {
            Ok(request) => request,
            Err(error) => {
                warn!(%remote, %error, "Malformed fleet request");
                let _ = send.reset(1u32.into());
                continue;
            }
        };

        let answer = responder.answer(&request);
        let payload = match serde_json::to_vec(&answer) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, "Failed to encode fleet response");
                let _ = send.reset(2u32.into());
                continue;
            }
        };
        if let Err(error) = send.write_all(&payload).await {
            debug!(%remote, %error, "Failed to send fleet response");
            break;
        }
        let _ = send.finish();
        debug!(%remote, peers = answer.peers.len(), "Answered fleet request");
    }
}
