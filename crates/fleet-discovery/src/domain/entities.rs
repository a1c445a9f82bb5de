//! Core domain entities for fleet learning.
//!
//! Peer records, network addresses and timestamps. Identities live in
//! [`super::identity`].

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use sha2::{Digest, Sha256};

use super::identity::PeerIdentity;

/// SHA-256 digest of a DER-encoded TLS certificate.
pub type Fingerprint = [u8; 32];

/// Compute the fingerprint of a DER-encoded certificate.
pub fn fingerprint_of(certificate_der: &[u8]) -> Fingerprint {
    Sha256::digest(certificate_der).into()
}

/// Socket address (IP + port), an abstraction over `std::net::SocketAddr`.
///
/// Ordering is lexicographic on (ip, port) and is used as the last
/// tie-breaker when merging peer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SocketAddr {
    /// IP address (v4 or v6).
    pub ip: IpAddr,
    /// Port number.
    pub port: u16,
}

impl SocketAddr {
    /// Create a new socket address from IP and port.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Whether other workers on the public internet could reach this address.
    pub fn is_routable(&self) -> bool {
        self.port != 0 && self.ip.is_routable()
    }
}

impl fmt::Display for SocketAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", std::net::SocketAddr::from(*self))
    }
}

impl From<std::net::SocketAddr> for SocketAddr {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::new(addr.ip().into(), addr.port())
    }
}

impl From<SocketAddr> for std::net::SocketAddr {
    fn from(addr: SocketAddr) -> Self {
        std::net::SocketAddr::new(addr.ip.into(), addr.port)
    }
}

impl std::str::FromStr for SocketAddr {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<std::net::SocketAddr>().map(Into::into)
    }
}

/// IP address enum supporting both IPv4 and IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IpAddr {
    /// IPv4 address (4 bytes).
    V4([u8; 4]),
    /// IPv6 address (16 bytes).
    V6([u8; 16]),
}

impl IpAddr {
    /// Create an IPv4 address
    pub fn v4(a: u8, b: u8, c: u8, d: u8) -> Self {
        IpAddr::V4([a, b, c, d])
    }

    /// Create an IPv6 address from bytes
    pub fn v6(bytes: [u8; 16]) -> Self {
        IpAddr::V6(bytes)
    }

    /// The IPv4 loopback address, used as the dev-mode fallback host.
    pub fn loopback() -> Self {
        IpAddr::v4(127, 0, 0, 1)
    }

    /// Check if this is an IPv4 address
    pub fn is_ipv4(&self) -> bool {
        matches!(self, IpAddr::V4(_))
    }

    /// Check if this is an IPv6 address
    pub fn is_ipv6(&self) -> bool {
        matches!(self, IpAddr::V6(_))
    }

    /// Check if this is a loopback address (127.0.0.0/8 or ::1).
    pub fn is_loopback(&self) -> bool {
        match self {
            IpAddr::V4(octets) => Ipv4Addr::from(*octets).is_loopback(),
            IpAddr::V6(bytes) => Ipv6Addr::from(*bytes).is_loopback(),
        }
    }

    /// Check if this is the unspecified address (0.0.0.0 or ::).
    pub fn is_unspecified(&self) -> bool {
        match self {
            IpAddr::V4(octets) => Ipv4Addr::from(*octets).is_unspecified(),
            IpAddr::V6(bytes) => Ipv6Addr::from(*bytes).is_unspecified(),
        }
    }

    /// Publicly routable unicast address.
    ///
    /// Rejects loopback, unspecified, private, shared (CGNAT), link-local,
    /// documentation, broadcast, multicast and reserved ranges, plus the
    /// IPv6 equivalents (unique-local, link-local, documentation). An
    /// IPv4-mapped IPv6 address is judged by its embedded IPv4 address.
    pub fn is_routable(&self) -> bool {
        match self {
            IpAddr::V4(octets) => is_routable_v4(Ipv4Addr::from(*octets)),
            IpAddr::V6(bytes) => {
                let ip = Ipv6Addr::from(*bytes);
                match ip.to_ipv4_mapped() {
                    Some(v4) => is_routable_v4(v4),
                    None => is_routable_v6(ip),
                }
            }
        }
    }
}

fn is_routable_v4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    let shared = a == 100 && (64..128).contains(&b);
    let this_network = a == 0;
    let reserved = a >= 240;
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_documentation()
        || ip.is_broadcast()
        || ip.is_multicast()
        || shared
        || this_network
        || reserved)
}

fn is_routable_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    let documentation = first == 0x2001 && ip.segments()[1] == 0x0db8;
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || unique_local
        || link_local
        || documentation)
}

impl fmt::Display for IpAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", std::net::IpAddr::from(*self))
    }
}

impl From<std::net::IpAddr> for IpAddr {
    fn from(ip: std::net::IpAddr) -> Self {
        match ip {
            std::net::IpAddr::V4(v4) => IpAddr::V4(v4.octets()),
            std::net::IpAddr::V6(v6) => IpAddr::V6(v6.octets()),
        }
    }
}

impl From<IpAddr> for std::net::IpAddr {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(octets) => std::net::IpAddr::V4(Ipv4Addr::from(octets)),
            IpAddr::V6(bytes) => std::net::IpAddr::V6(Ipv6Addr::from(bytes)),
        }
    }
}

impl std::str::FromStr for IpAddr {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<std::net::IpAddr>().map(Into::into)
    }
}

/// Unix timestamp in seconds
///
/// Timestamps are clamped to a reasonable maximum so that a peer announcing
/// `u64::MAX` cannot pin itself to the top of every merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Maximum reasonable timestamp (year 9999).
    pub const MAX_REASONABLE: u64 = 253_402_300_799;

    /// Create a new timestamp, clamping to MAX_REASONABLE.
    pub fn new(secs: u64) -> Self {
        Self(secs.min(Self::MAX_REASONABLE))
    }

    /// Get the underlying seconds value.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed between `earlier` and `self` (zero if `earlier` is later).
    pub fn secs_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Local view of a peer's trustworthiness and reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerStatus {
    /// Learned from a teacher, never contacted directly.
    Unknown,
    /// Answered a fleet request from us with a consistent identity.
    Verified,
    /// Known to have left its staking bond. Never selected, never re-announced.
    Detached,
    /// Failed the last contact attempt.
    Unreachable,
}

impl PeerStatus {
    /// Rank used as a merge tie-breaker when two records share `last_seen`.
    pub fn rank(&self) -> u8 {
        match self {
            PeerStatus::Unknown => 0,
            PeerStatus::Unreachable => 1,
            PeerStatus::Verified => 2,
            PeerStatus::Detached => 3,
        }
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PeerStatus::Unknown => "unknown",
            PeerStatus::Verified => "verified",
            PeerStatus::Detached => "detached",
            PeerStatus::Unreachable => "unreachable",
        };
        f.write_str(label)
    }
}

/// Everything this node knows about one other worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Content-derived identifier of the peer.
    pub identity: PeerIdentity,
    /// Where the peer serves fleet requests.
    pub network_address: SocketAddr,
    /// SHA-256 of the peer's pinned TLS certificate.
    pub certificate_fingerprint: Fingerprint,
    /// Freshest observation of the peer, by us or by a teacher.
    pub last_seen: Timestamp,
    /// Human-readable label derived from the identity.
    pub nickname: String,
    /// Local status.
    pub status: PeerStatus,
    /// Consecutive failed contacts. Local bookkeeping, never sent over the wire.
    pub failure_count: u32,
}

impl PeerRecord {
    /// Create a record for a freshly learned peer.
    pub fn new(
        identity: PeerIdentity,
        network_address: SocketAddr,
        certificate_fingerprint: Fingerprint,
        last_seen: Timestamp,
    ) -> Self {
        Self {
            nickname: identity.nickname(),
            identity,
            network_address,
            certificate_fingerprint,
            last_seen,
            status: PeerStatus::Unknown,
            failure_count: 0,
        }
    }

    /// Builder-style status override.
    pub fn with_status(mut self, status: PeerStatus) -> Self {
        self.status = status;
        self
    }

    /// Key deciding which of two records for the same identity wins a merge.
    pub fn merge_key(&self) -> (Timestamp, u8, SocketAddr) {
        (self.last_seen, self.status.rank(), self.network_address)
    }
}

impl fmt::Display for PeerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) at {}",
            self.nickname, self.identity, self.network_address
        )
    }
}
