//! Fleet exchange messages.
//!
//! These are the only types that cross the wire. Byte fields travel as
//! lowercase hex and identities as checksummed text, so a malformed entry
//! from one peer can be rejected individually instead of failing the whole
//! response.

use serde::{Deserialize, Serialize};

use super::entities::{PeerRecord, Timestamp};
use super::registry::FleetState;

/// One peer as announced by a teacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAnnouncement {
    /// Checksummed `0x` identity.
    pub identity: String,
    /// IP address the peer serves on.
    pub host: String,
    /// Port the peer serves on.
    pub port: u16,
    /// Hex DER certificate; empty when the sender omitted it.
    #[serde(default)]
    pub certificate: String,
    /// Hex SHA-256 of the certificate.
    pub fingerprint: String,
    /// Unix seconds of the sender's freshest sighting.
    pub last_seen: u64,
}

impl PeerAnnouncement {
    /// Announce a known record, optionally with its pinned certificate.
    pub fn from_record(record: &PeerRecord, certificate: Option<&[u8]>) -> Self {
        Self {
            identity: record.identity.to_checksum_string(),
            host: record.network_address.ip.to_string(),
            port: record.network_address.port,
            certificate: certificate.map(hex::encode).unwrap_or_default(),
            fingerprint: hex::encode(record.certificate_fingerprint),
            last_seen: record.last_seen.as_secs(),
        }
    }

    /// Decoded certificate bytes, `None` when omitted or not valid hex.
    pub fn certificate_bytes(&self) -> Option<Vec<u8>> {
        if self.certificate.is_empty() {
            return None;
        }
        hex::decode(&self.certificate).ok()
    }
}

/// "What do you know?" request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetRequest {
    /// Ask the responder to include its own certificate.
    pub include_certificate: bool,
    /// Hex checksum of the requester's last view of the responder's fleet.
    #[serde(default)]
    pub known_checksum: Option<String>,
}

/// Answer to a [`FleetRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetResponse {
    /// The responder itself.
    pub responder: PeerAnnouncement,
    /// Responder's fleet version.
    pub fleet_version: u64,
    /// Hex checksum of the responder's fleet.
    pub fleet_checksum: String,
    /// The requester's checksum matched; `peers` is empty.
    #[serde(default)]
    pub unchanged: bool,
    /// Known non-detached peers.
    #[serde(default)]
    pub peers: Vec<PeerAnnouncement>,
}

impl FleetResponse {
    /// Response carrying the full peer list.
    pub fn full(responder: PeerAnnouncement, fleet: FleetState, peers: Vec<PeerAnnouncement>) -> Self {
        Self {
            responder,
            fleet_version: fleet.version,
            fleet_checksum: fleet.checksum_hex(),
            unchanged: false,
            peers,
        }
    }

    /// Response telling the requester nothing changed.
    pub fn unchanged(responder: PeerAnnouncement, fleet: FleetState) -> Self {
        Self {
            responder,
            fleet_version: fleet.version,
            fleet_checksum: fleet.checksum_hex(),
            unchanged: true,
            peers: Vec::new(),
        }
    }
}

/// A response as received by the transport, plus what the TLS layer saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherResponse {
    /// Decoded response.
    pub response: FleetResponse,
    /// DER certificate presented during the TLS handshake, when the
    /// transport has one.
    pub observed_certificate: Option<Vec<u8>>,
    /// When the response arrived.
    pub received_at: Option<Timestamp>,
}

impl TeacherResponse {
    /// Response without transport-level observations.
    pub fn plain(response: FleetResponse) -> Self {
        Self {
            response,
            observed_certificate: None,
            received_at: None,
        }
    }
}
