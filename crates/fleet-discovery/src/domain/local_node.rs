//! The local node ("Self").

use super::entities::{fingerprint_of, Fingerprint, PeerRecord, PeerStatus, SocketAddr, Timestamp};
use super::identity::PeerIdentity;
use super::messages::PeerAnnouncement;
use super::value_objects::OperatingMode;

/// This worker's own identity, address, certificate and mode.
///
/// Never stored in the peer registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNode {
    /// Worker identity.
    pub identity: PeerIdentity,
    /// Advertised address.
    pub address: SocketAddr,
    /// DER certificate served over TLS.
    pub certificate: Vec<u8>,
    /// SHA-256 of `certificate`.
    pub fingerprint: Fingerprint,
    /// Operating mode flags.
    pub mode: OperatingMode,
}

impl LocalNode {
    /// Build the local node; the fingerprint is computed from `certificate`.
    pub fn new(
        identity: PeerIdentity,
        address: SocketAddr,
        certificate: Vec<u8>,
        mode: OperatingMode,
    ) -> Self {
        Self {
            identity,
            address,
            fingerprint: fingerprint_of(&certificate),
            certificate,
            mode,
        }
    }

    /// Human-readable label.
    pub fn nickname(&self) -> String {
        self.identity.nickname()
    }

    /// The local node as a peer record, seen at `now`.
    pub fn as_record(&self, now: Timestamp) -> PeerRecord {
        PeerRecord::new(self.identity, self.address, self.fingerprint, now)
            .with_status(PeerStatus::Verified)
    }

    /// Announcement of the local node, with the certificate if requested.
    pub fn announcement(&self, now: Timestamp, include_certificate: bool) -> PeerAnnouncement {
        let certificate = include_certificate.then_some(self.certificate.as_slice());
        PeerAnnouncement::from_record(&self.as_record(now), certificate)
    }
}
