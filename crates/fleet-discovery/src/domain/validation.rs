//! Candidate validation.
//!
//! Checks run in a fixed order: identity, not-self, certificate integrity,
//! address routability. Trust-on-first-use against the certificate store is
//! the caller's final step because it needs storage.

use super::entities::{fingerprint_of, Fingerprint, IpAddr, PeerRecord, SocketAddr, Timestamp};
use super::errors::RejectReason;
use super::identity::PeerIdentity;
use super::messages::PeerAnnouncement;

/// Context for judging candidates.
#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy {
    /// The local node; never merged.
    pub local_identity: PeerIdentity,
    /// Dev mode accepts loopback and private addresses.
    pub allow_unroutable: bool,
    /// Announced `last_seen` values in the future are clamped to this.
    pub now: Timestamp,
}

/// A candidate that passed every stateless check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPeer {
    /// Candidate record, status `Unknown`.
    pub record: PeerRecord,
    /// Certificate supplied alongside, if any.
    pub certificate: Option<Vec<u8>>,
}

/// A candidate that was not merged, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedPeer {
    /// Identity as announced (possibly malformed).
    pub identity: String,
    /// Reason for rejection.
    pub reason: RejectReason,
}

/// Run the stateless checks on one announcement.
pub fn validate_announcement(
    announcement: &PeerAnnouncement,
    policy: &ValidationPolicy,
) -> Result<ValidatedPeer, RejectReason> {
    let identity =
        PeerIdentity::parse(&announcement.identity).map_err(RejectReason::MalformedIdentity)?;
    if identity == policy.local_identity {
        return Err(RejectReason::SelfIdentity);
    }

    let fingerprint = parse_fingerprint(&announcement.fingerprint)?;
    let certificate = if announcement.certificate.is_empty() {
        None
    } else {
        let der = announcement.certificate_bytes().ok_or_else(|| {
            RejectReason::MalformedCertificate("certificate is not valid hex".into())
        })?;
        if fingerprint_of(&der) != fingerprint {
            return Err(RejectReason::MalformedCertificate(
                "fingerprint does not match certificate".into(),
            ));
        }
        Some(der)
    };

    let ip: IpAddr = announcement
        .host
        .parse()
        .map_err(|_| RejectReason::MalformedAddress(announcement.host.clone()))?;
    if announcement.port == 0 {
        return Err(RejectReason::MalformedAddress(format!(
            "{}:0",
            announcement.host
        )));
    }
    let address = SocketAddr::new(ip, announcement.port);
    if !policy.allow_unroutable && !address.is_routable() {
        return Err(RejectReason::UnroutableAddress(address));
    }

    let last_seen = Timestamp::new(announcement.last_seen).min(policy.now);
    Ok(ValidatedPeer {
        record: PeerRecord::new(identity, address, fingerprint, last_seen),
        certificate,
    })
}

/// Decode a hex SHA-256 fingerprint.
pub fn parse_fingerprint(text: &str) -> Result<Fingerprint, RejectReason> {
    let mut fingerprint = [0u8; 32];
    hex::decode_to_slice(text, &mut fingerprint)
        .map_err(|_| RejectReason::MalformedCertificate(format!("bad fingerprint {text:?}")))?;
    Ok(fingerprint)
}
