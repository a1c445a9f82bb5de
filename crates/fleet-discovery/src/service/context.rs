use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{
    validate_announcement, LocalNode, PeerAnnouncement, PeerRecord, PeerRegistry, PeerStatus,
    StoreError, Timestamp, ValidationPolicy,
};
use crate::ports::{FleetEventPublisher, KeyValueStore, TimeSource};

use super::certificates::CertificateStore;

/// Key prefix of persisted peer records.
pub const PEER_PREFIX: &[u8] = b"peer/";

/// Shared state of one worker: who it is, whom it knows, whom it trusts.
///
/// Constructed once at startup and shared by the learner and the responder.
///
/// # Example
///
/// ```rust,ignore
/// let ctx = Arc::new(FleetContext::new(local, store, events, clock));
/// ctx.restore()?;
/// let learner = NodeLearner::new(ctx.clone(), transport, LearningConfig::default());
/// let responder = FleetResponder::new(ctx);
/// ```
pub struct FleetContext {
    local: LocalNode,
    registry: PeerRegistry,
    certificates: CertificateStore,
    store: Arc<dyn KeyValueStore>,
    events: Arc<dyn FleetEventPublisher>,
    clock: Arc<dyn TimeSource>,
}

impl FleetContext {
    /// Create a context with an empty registry.
    pub fn new(
        local: LocalNode,
        store: Arc<dyn KeyValueStore>,
        events: Arc<dyn FleetEventPublisher>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            certificates: CertificateStore::new(store.clone(), events.clone()),
            registry: PeerRegistry::new(),
            local,
            store,
            events,
            clock,
        }
    }

    /// The local node.
    pub fn local(&self) -> &LocalNode {
        &self.local
    }

    /// Known peers.
    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Pinned certificates.
    pub fn certificates(&self) -> &CertificateStore {
        &self.certificates
    }

    /// Event sink.
    pub fn events(&self) -> &Arc<dyn FleetEventPublisher> {
        &self.events
    }

    /// Current time.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Write `records` under `peer/<identity>`.
    pub fn persist_peers<'a>(
        &self,
        records: impl IntoIterator<Item = &'a PeerRecord>,
    ) -> Result<(), StoreError> {
        for record in records {
            let value = serde_json::to_vec(&PeerAnnouncement::from_record(record, None))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            self.store.put(&peer_key(record), &value)?;
        }
        Ok(())
    }

    /// Reload persisted peers into the registry with status `Unknown`.
    ///
    /// Entries that no longer decode are skipped with a warning. Returns the
    /// number of peers restored.
    pub fn restore(&self) -> Result<usize, StoreError> {
        let policy = ValidationPolicy {
            local_identity: self.local.identity,
            allow_unroutable: self.local.mode.allows_unroutable_peers(),
            now: Timestamp::new(Timestamp::MAX_REASONABLE),
        };

        let mut records = Vec::new();
        for (key, value) in self.store.prefix_scan(PEER_PREFIX)? {
            let announcement: PeerAnnouncement = match serde_json::from_slice(&value) {
                Ok(announcement) => announcement,
                Err(e) => {
                    warn!(key = %String::from_utf8_lossy(&key), error = %e, "Skipping unreadable peer entry");
                    continue;
                }
            };
            match validate_announcement(&announcement, &policy) {
                Ok(peer) => records.push(peer.record.with_status(PeerStatus::Unknown)),
                Err(reason) => {
                    debug!(identity = %announcement.identity, %reason, "Skipping stored peer")
                }
            }
        }

        let restored = self.registry.merge(records).inserted.len();
        if restored > 0 {
            info!(count = restored, "Restored known peers from storage");
        }
        Ok(restored)
    }
}

fn peer_key(record: &PeerRecord) -> Vec<u8> {
    let mut key = PEER_PREFIX.to_vec();
    key.extend_from_slice(hex::encode(record.identity.as_bytes()).as_bytes());
    key
}
