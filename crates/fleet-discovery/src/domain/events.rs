//! Fleet events emitted while learning.

use super::entities::{Fingerprint, SocketAddr};
use super::identity::PeerIdentity;

/// Something observable happened to the local view of the fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetEvent {
    /// A certificate was pinned for the first time.
    CertificateSaved {
        /// Peer the certificate belongs to.
        identity: PeerIdentity,
        /// Peer nickname.
        nickname: String,
        /// Pinned fingerprint.
        fingerprint: Fingerprint,
    },
    /// A previously unknown peer was added to the registry.
    PeerRemembered {
        /// New peer.
        identity: PeerIdentity,
        /// Peer nickname.
        nickname: String,
        /// Where it serves.
        address: SocketAddr,
    },
    /// A peer presented a certificate different from the pinned one.
    TrustConflict {
        /// Peer whose certificate conflicts.
        identity: PeerIdentity,
        /// Pinned fingerprint.
        pinned: Fingerprint,
        /// Offered fingerprint.
        offered: Fingerprint,
        /// Address of the teacher that relayed the offer.
        reported_by: SocketAddr,
    },
    /// A teacher failed to answer.
    TeacherUnreachable {
        /// Teacher identity, unknown for seeds.
        identity: Option<PeerIdentity>,
        /// Teacher address.
        address: SocketAddr,
        /// Failure description.
        reason: String,
    },
}
