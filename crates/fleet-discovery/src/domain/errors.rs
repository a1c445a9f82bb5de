//! # Domain Errors
//!
//! Error types for fleet learning, certificate pinning and bonding.

use thiserror::Error;

use super::bonding::BondingStatus;
use super::entities::SocketAddr;
use super::identity::PeerIdentity;

/// Failure to parse a textual identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Identity text lacks the `0x` prefix.
    #[error("identity must start with 0x")]
    MissingPrefix,

    /// Wrong number of hex digits.
    #[error("identity must have {expected} hex digits, got {actual}")]
    InvalidLength {
        /// Required digit count
        expected: usize,
        /// Supplied digit count
        actual: usize,
    },

    /// Non-hex characters.
    #[error("identity contains non-hex characters")]
    InvalidHex,

    /// Mixed-case digits that do not match the checksum.
    #[error("identity checksum mismatch")]
    BadChecksum,
}

/// Attempted bonding transition that the lifecycle forbids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BondingTransitionError {
    /// `Detached` and `TimedOut` are terminal.
    #[error("bonding state {from:?} is terminal and cannot move to {to:?}")]
    Terminal {
        /// Current state
        from: BondingStatus,
        /// Attempted state
        to: BondingStatus,
    },

    /// Only a pending worker can time out.
    #[error("cannot time out from {from:?}")]
    NotPending {
        /// Current state
        from: BondingStatus,
    },
}

/// Why a candidate peer from a teacher was not merged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// Identity text did not parse.
    #[error("malformed identity: {0}")]
    MalformedIdentity(IdentityError),

    /// The candidate is this node.
    #[error("candidate is the local node")]
    SelfIdentity,

    /// Certificate missing, undecodable, or not matching the announced fingerprint.
    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),

    /// Host or port did not parse.
    #[error("malformed address: {0}")]
    MalformedAddress(String),

    /// Loopback, private or otherwise non-public address outside dev mode.
    #[error("unroutable address {0}")]
    UnroutableAddress(SocketAddr),

    /// A different certificate is already pinned for this identity.
    #[error("certificate conflicts with the pinned certificate")]
    TrustConflict,

    /// The certificate store could not be consulted.
    #[error("certificate store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Failure of a single fleet request at the transport level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No answer within the request timeout.
    #[error("request to {0} timed out")]
    Timeout(SocketAddr),

    /// Connection could not be established or was lost.
    #[error("{address} unreachable: {reason}")]
    Unreachable {
        /// Target address
        address: SocketAddr,
        /// Underlying cause
        reason: String,
    },

    /// Response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// TLS or endpoint setup failure.
    #[error("tls error: {0}")]
    Tls(String),
}

/// Failure of an oracle query. Always transient from the caller's side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// Oracle could not be reached.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// Oracle answered with something unintelligible.
    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

/// Failure of the key/value store backing certificates and peers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Underlying storage failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored entry did not decode.
    #[error("corrupt entry under {key}: {reason}")]
    Corrupt {
        /// Offending key (lossy UTF-8)
        key: String,
        /// Decode failure
        reason: String,
    },
}

/// The node could not determine the host it should advertise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressResolutionError {
    /// Public mode and the external IP oracle failed.
    #[error("unknown IP address: {reason}")]
    UnknownIpAddress {
        /// Oracle failure
        reason: String,
    },

    /// The oracle reported a loopback or unspecified address.
    #[error("external IP oracle reported unusable address {0}")]
    Unroutable(String),
}

/// Failure of one learning round against one teacher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LearnError {
    /// The teacher is detached or is the local node.
    #[error("{0} is not eligible as a teacher")]
    TeacherNotEligible(PeerIdentity),

    /// Lonely mode forbids contacting anyone.
    #[error("lonely mode: learning disabled")]
    Lonely,

    /// Network-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Responder claimed a different identity than the record we selected.
    #[error("teacher identity mismatch: expected {expected}, got {actual}")]
    TeacherIdentityMismatch {
        /// Identity we selected
        expected: PeerIdentity,
        /// Identity in the response
        actual: String,
    },

    /// Seed address turned out to be the local node.
    #[error("seed {0} is the local node")]
    SelfTeacher(SocketAddr),

    /// The teacher's own announcement was unusable.
    #[error("malformed teacher response: {0}")]
    MalformedResponse(String),

    /// TLS-observed certificate differs from the one in the response.
    #[error("teacher certificate does not match the TLS session")]
    CertificateMismatch,

    /// The teacher's certificate conflicts with the pinned one.
    #[error("trust conflict for teacher {0}")]
    TrustConflict(PeerIdentity),

    /// Certificate or peer persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The round leader was cancelled before producing a result.
    #[error("learning round cancelled")]
    Cancelled,
}

impl LearnError {
    /// Whether the failure should count against the teacher.
    pub fn is_teacher_failure(&self) -> bool {
        matches!(
            self,
            LearnError::Transport(_)
                | LearnError::TeacherIdentityMismatch { .. }
                | LearnError::MalformedResponse(_)
                | LearnError::CertificateMismatch
                | LearnError::TrustConflict(_)
        )
    }
}

