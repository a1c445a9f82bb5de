use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{FleetRequest, FleetResponse, PeerAnnouncement, PeerStatus};
use crate::ports::FleetServingApi;

use super::context::FleetContext;

/// The inbound "what do you know" capability of a worker.
///
/// Read-only over the shared [`FleetContext`]; safe to call while the
/// learner is merging.
pub struct FleetResponder {
    ctx: Arc<FleetContext>,
}

impl FleetResponder {
    /// Create a responder over `ctx`.
    pub fn new(ctx: Arc<FleetContext>) -> Self {
        Self { ctx }
    }
}

impl FleetServingApi for FleetResponder {
    fn answer(&self, request: &FleetRequest) -> FleetResponse {
        let now = self.ctx.now();
        let responder = self
            .ctx
            .local()
            .announcement(now, request.include_certificate);
        let fleet = self.ctx.registry().fleet_state();

        if request.known_checksum.as_deref() == Some(fleet.checksum_hex().as_str()) {
            debug!(version = fleet.version, "Answering with unchanged fleet");
            return FleetResponse::unchanged(responder, fleet);
        }

        let certificates = self.ctx.certificates();
        let peers = self
            .ctx
            .registry()
            .snapshot()
            .into_iter()
            .filter(|peer| peer.status != PeerStatus::Detached)
            .filter_map(|peer| match certificates.get(&peer.identity) {
                Ok(Some(entry)) => Some(PeerAnnouncement::from_record(&peer, Some(&entry.certificate))),
                Ok(None) => {
                    debug!(peer = %peer.identity, "No pinned certificate; not announcing");
                    None
                }
                Err(error) => {
                    warn!(peer = %peer.identity, %error, "Certificate lookup failed");
                    None
                }
            })
            .collect();

        FleetResponse::full(responder, fleet, peers)
    }

    fn tls_certificate(&self) -> Vec<u8> {
        self.ctx.local().certificate.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryEventPublisher, InMemoryKeyValueStore};
    use crate::domain::{
        fingerprint_of, IpAddr, LocalNode, OperatingMode, PeerIdentity, PeerRecord, SocketAddr,
        Timestamp,
    };
    use crate::testing::ManualTimeSource;

    fn responder() -> (FleetResponder, Arc<FleetContext>) {
        let local = LocalNode::new(
            PeerIdentity::new([0xAA; 20]),
            SocketAddr::new(IpAddr::v4(45, 33, 7, 7), 9151),
            b"local cert".to_vec(),
            OperatingMode::default(),
        );
        let ctx = Arc::new(FleetContext::new(
            local,
            Arc::new(InMemoryKeyValueStore::new()),
            Arc::new(InMemoryEventPublisher::new()),
            Arc::new(ManualTimeSource::new(500)),
        ));
        (FleetResponder::new(ctx.clone()), ctx)
    }

    fn known(ctx: &FleetContext, id: u8, status: PeerStatus) {
        let cert = vec![id; 8];
        let identity = PeerIdentity::new([id; 20]);
        ctx.certificates()
            .put_if_absent(identity, &cert, Timestamp::new(1))
            .unwrap();
        ctx.registry().merge(vec![PeerRecord::new(
            identity,
            SocketAddr::new(IpAddr::v4(45, 33, 7, id), 9151),
            fingerprint_of(&cert),
            Timestamp::new(100),
        )
        .with_status(status)]);
    }

    #[test]
    fn test_answer_lists_known_peers_with_certificates() {
        let (responder, ctx) = responder();
        known(&ctx, 1, PeerStatus::Verified);
        known(&ctx, 2, PeerStatus::Unknown);

        let response = responder.answer(&FleetRequest {
            include_certificate: true,
            known_checksum: None,
        });
        assert!(!response.unchanged);
        assert_eq!(response.peers.len(), 2);
        assert!(response.peers.iter().all(|p| !p.certificate.is_empty()));
        assert_eq!(
            response.responder.certificate_bytes(),
            Some(b"local cert".to_vec())
        );
        assert_eq!(response.fleet_version, ctx.registry().fleet_state().version);
    }

    #[test]
    fn test_detached_peers_are_not_announced() {
        let (responder, ctx) = responder();
        known(&ctx, 1, PeerStatus::Verified);
        known(&ctx, 2, PeerStatus::Detached);
        let response = responder.answer(&FleetRequest::default());
        assert_eq!(response.peers.len(), 1);
        assert!(response.responder.certificate.is_empty());
    }

    #[test]
    fn test_matching_checksum_short_circuits() {
        let (responder, ctx) = responder();
        known(&ctx, 1, PeerStatus::Verified);
        let checksum = ctx.registry().fleet_state().checksum_hex();

        let response = responder.answer(&FleetRequest {
            include_certificate: false,
            known_checksum: Some(checksum),
        });
        assert!(response.unchanged);
        assert!(response.peers.is_empty());
    }
}
