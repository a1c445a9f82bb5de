//! Peer registry and fleet state.
//!
//! At most one record per identity. Merges are applied under a single write
//! lock so that readers always see whole records and a batch is either fully
//! applied or not at all.

use std::collections::HashMap;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use super::entities::{PeerRecord, PeerStatus, SocketAddr, Timestamp};
use super::identity::PeerIdentity;

/// Compact summary of the known fleet, exchanged so that an unchanged fleet
/// can be answered without a peer list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FleetState {
    /// Incremented once for every merge or observation that changed the registry.
    pub version: u64,
    /// SHA-256 over the sorted (identity, fingerprint, address) triples.
    pub checksum: [u8; 32],
    /// Number of known peers.
    pub population: usize,
}

impl FleetState {
    fn empty() -> Self {
        Self {
            version: 0,
            checksum: checksum_of(std::iter::empty()),
            population: 0,
        }
    }

    /// Lowercase hex of the checksum.
    pub fn checksum_hex(&self) -> String {
        hex::encode(self.checksum)
    }
}

/// Outcome of merging one candidate into an existing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
    /// Identity was not known.
    Insert,
    /// Candidate is strictly newer; replaces address, `last_seen` and status.
    Update,
    /// Existing record wins.
    Keep,
}

/// Decide how `incoming` merges into `existing`.
///
/// The incoming record wins iff `(last_seen, status rank, address)` is
/// strictly greater. The pinned fingerprint and the local failure count are
/// never taken from the candidate.
pub fn merge_decision(existing: Option<&PeerRecord>, incoming: &PeerRecord) -> MergeDecision {
    match existing {
        None => MergeDecision::Insert,
        Some(current) if incoming.merge_key() > current.merge_key() => MergeDecision::Update,
        Some(_) => MergeDecision::Keep,
    }
}

/// Records changed by one merge batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Newly remembered peers.
    pub inserted: Vec<PeerRecord>,
    /// Known peers whose record advanced.
    pub updated: Vec<PeerRecord>,
}

impl MergeReport {
    /// Whether the merge changed anything.
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty()
    }

    /// Inserted followed by updated records.
    pub fn changed(&self) -> impl Iterator<Item = &PeerRecord> {
        self.inserted.iter().chain(self.updated.iter())
    }
}

#[derive(Debug)]
struct Inner {
    peers: HashMap<PeerIdentity, PeerRecord>,
    state: FleetState,
}

impl Inner {
    fn bump(&mut self) {
        self.state.version += 1;
        self.state.population = self.peers.len();
        self.state.checksum = checksum_of(self.peers.values());
    }
}

/// Thread-safe registry of every peer this node knows.
#[derive(Debug)]
pub struct PeerRegistry {
    inner: RwLock<Inner>,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerRegistry {
    /// Empty registry at fleet version 0.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                peers: HashMap::new(),
                state: FleetState::empty(),
            }),
        }
    }

    /// Merge a batch of candidates atomically.
    ///
    /// Bumps the fleet version once if anything changed.
    pub fn merge(&self, candidates: Vec<PeerRecord>) -> MergeReport {
        let mut inner = self.inner.write();
        let mut report = MergeReport::default();

        for candidate in candidates {
            match merge_decision(inner.peers.get(&candidate.identity), &candidate) {
                MergeDecision::Insert => {
                    let record = PeerRecord {
                        failure_count: 0,
                        ..candidate
                    };
                    inner.peers.insert(record.identity, record.clone());
                    report.inserted.push(record);
                }
                MergeDecision::Update => {
                    if let Some(current) = inner.peers.get_mut(&candidate.identity) {
                        current.network_address = candidate.network_address;
                        current.last_seen = candidate.last_seen;
                        current.status = candidate.status;
                        report.updated.push(current.clone());
                    }
                }
                MergeDecision::Keep => {}
            }
        }

        // A record inserted and then updated in the same batch is reported once.
        let inserted: Vec<PeerIdentity> = report.inserted.iter().map(|p| p.identity).collect();
        report.updated.retain(|p| !inserted.contains(&p.identity));
        for record in report.inserted.iter_mut() {
            if let Some(current) = inner.peers.get(&record.identity) {
                *record = current.clone();
            }
        }

        if !report.is_empty() {
            inner.bump();
        }
        report
    }

    /// Record a successful direct contact.
    ///
    /// Inserts the peer if unknown. Returns `true` when the peer was new.
    pub fn observe_verified(&self, record: PeerRecord, now: Timestamp) -> bool {
        let mut inner = self.inner.write();
        let is_new = !inner.peers.contains_key(&record.identity);
        let entry = inner.peers.entry(record.identity).or_insert(record.clone());
        let moved = entry.network_address != record.network_address;
        entry.network_address = record.network_address;
        entry.last_seen = entry.last_seen.max(now);
        entry.status = PeerStatus::Verified;
        entry.failure_count = 0;
        if is_new || moved {
            inner.bump();
        }
        is_new
    }

    /// Record a failed contact: status `Unreachable`, failure count incremented.
    pub fn mark_unreachable(&self, identity: &PeerIdentity) -> Option<PeerRecord> {
        let mut inner = self.inner.write();
        let record = inner.peers.get_mut(identity)?;
        if record.status != PeerStatus::Detached {
            record.status = PeerStatus::Unreachable;
        }
        record.failure_count = record.failure_count.saturating_add(1);
        Some(record.clone())
    }

    /// Look up one peer.
    pub fn get(&self, identity: &PeerIdentity) -> Option<PeerRecord> {
        self.inner.read().peers.get(identity).cloned()
    }

    /// Consistent copy of every record.
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.inner.read().peers.values().cloned().collect()
    }

    /// Current fleet state.
    pub fn fleet_state(&self) -> FleetState {
        self.inner.read().state
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.inner.read().peers.len()
    }

    /// Whether no peer is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn checksum_of<'a>(records: impl Iterator<Item = &'a PeerRecord>) -> [u8; 32] {
    let mut triples: Vec<(&PeerIdentity, &[u8; 32], SocketAddr)> = records
        .map(|r| (&r.identity, &r.certificate_fingerprint, r.network_address))
        .collect();
    triples.sort();

    let mut hasher = Sha256::new();
    for (identity, fingerprint, address) in triples {
        hasher.update(identity.as_bytes());
        hasher.update(fingerprint);
        hasher.update(address.to_string().as_bytes());
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IpAddr;

    fn record(id: u8, last_seen: u64, port: u16) -> PeerRecord {
        PeerRecord::new(
            PeerIdentity::new([id; 20]),
            SocketAddr::new(IpAddr::v4(45, 33, 0, id), port),
            [id; 32],
            Timestamp::new(last_seen),
        )
    }

    #[test]
    fn test_merge_inserts_and_bumps_version() {
        let registry = PeerRegistry::new();
        let report = registry.merge(vec![record(1, 10, 9151), record(2, 10, 9151)]);
        assert_eq!(report.inserted.len(), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.fleet_state().version, 1);
        assert_eq!(registry.fleet_state().population, 2);
    }

    #[test]
    fn test_merge_keeps_single_record_per_identity() {
        let registry = PeerRegistry::new();
        registry.merge(vec![record(1, 10, 9151), record(1, 12, 9152)]);
        assert_eq!(registry.len(), 1);
        let stored = registry.get(&PeerIdentity::new([1; 20])).unwrap();
        assert_eq!(stored.network_address.port, 9152);
        assert_eq!(stored.last_seen, Timestamp::new(12));
    }

    #[test]
    fn test_older_candidate_does_not_overwrite() {
        let registry = PeerRegistry::new();
        registry.merge(vec![record(1, 20, 9151)]);
        let report = registry.merge(vec![record(1, 10, 9999)]);
        assert!(report.is_empty());
        assert_eq!(registry.fleet_state().version, 1);
        let stored = registry.get(&PeerIdentity::new([1; 20])).unwrap();
        assert_eq!(stored.network_address.port, 9151);
    }

    #[test]
    fn test_rehomed_peer_updated_in_place() {
        let registry = PeerRegistry::new();
        registry.merge(vec![record(1, 10, 9151)]);
        let report = registry.merge(vec![record(1, 11, 9200)]);
        assert_eq!(report.updated.len(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(&PeerIdentity::new([1; 20])).unwrap().network_address.port,
            9200
        );
    }

    #[test]
    fn test_merge_never_replaces_fingerprint() {
        let registry = PeerRegistry::new();
        registry.merge(vec![record(1, 10, 9151)]);
        let mut rotated = record(1, 11, 9151);
        rotated.certificate_fingerprint = [0xEE; 32];
        registry.merge(vec![rotated]);
        assert_eq!(
            registry
                .get(&PeerIdentity::new([1; 20]))
                .unwrap()
                .certificate_fingerprint,
            [1; 32]
        );
    }

    #[test]
    fn test_merge_is_commutative() {
        let candidates = vec![
            record(1, 10, 9151),
            record(1, 12, 9152),
            record(1, 12, 9150),
            record(2, 5, 9151),
            record(2, 5, 9151).with_status(PeerStatus::Verified),
        ];

        let forward = PeerRegistry::new();
        forward.merge(candidates.clone());
        let backward = PeerRegistry::new();
        for candidate in candidates.iter().rev() {
            backward.merge(vec![candidate.clone()]);
        }

        let mut a = forward.snapshot();
        let mut b = backward.snapshot();
        a.sort_by_key(|p| p.identity);
        b.sort_by_key(|p| p.identity);
        assert_eq!(a, b);
        assert_eq!(forward.fleet_state().checksum, backward.fleet_state().checksum);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let registry = PeerRegistry::new();
        registry.merge(vec![record(1, 10, 9151)]);
        let state = registry.fleet_state();
        assert!(registry.merge(vec![record(1, 10, 9151)]).is_empty());
        assert_eq!(registry.fleet_state(), state);
    }

    #[test]
    fn test_mark_unreachable_preserves_failure_count_across_merge() {
        let registry = PeerRegistry::new();
        registry.merge(vec![record(1, 10, 9151)]);
        registry.mark_unreachable(&PeerIdentity::new([1; 20]));
        registry.mark_unreachable(&PeerIdentity::new([1; 20]));
        registry.merge(vec![record(1, 11, 9151)]);
        let stored = registry.get(&PeerIdentity::new([1; 20])).unwrap();
        assert_eq!(stored.failure_count, 2);
        assert_eq!(stored.status, PeerStatus::Unknown);
    }

    #[test]
    fn test_observe_verified_resets_failures() {
        let registry = PeerRegistry::new();
        assert!(registry.observe_verified(record(1, 10, 9151), Timestamp::new(50)));
        registry.mark_unreachable(&PeerIdentity::new([1; 20]));
        assert!(!registry.observe_verified(record(1, 10, 9151), Timestamp::new(60)));
        let stored = registry.get(&PeerIdentity::new([1; 20])).unwrap();
        assert_eq!(stored.status, PeerStatus::Verified);
        assert_eq!(stored.failure_count, 0);
        assert_eq!(stored.last_seen, Timestamp::new(60));
    }

    #[test]
    fn test_checksum_tracks_content() {
        let a = PeerRegistry::new();
        let b = PeerRegistry::new();
        assert_eq!(a.fleet_state().checksum, b.fleet_state().checksum);
        a.merge(vec![record(1, 10, 9151)]);
        assert_ne!(a.fleet_state().checksum, b.fleet_state().checksum);
        b.merge(vec![record(1, 99, 9151)]);
        assert_eq!(a.fleet_state().checksum, b.fleet_state().checksum);
    }
}
