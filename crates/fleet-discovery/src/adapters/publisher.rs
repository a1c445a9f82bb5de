//! Fleet event sinks.

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::domain::{FleetEvent, PeerIdentity};
use crate::ports::FleetEventPublisher;

/// Production publisher: every event becomes a log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

impl TracingEventPublisher {
    /// Create a new tracing publisher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FleetEventPublisher for TracingEventPublisher {
    fn publish(&self, event: FleetEvent) {
        match event {
            FleetEvent::CertificateSaved {
                identity,
                nickname,
                fingerprint,
            } => info!(
                peer = %identity,
                fingerprint = %hex::encode(fingerprint),
                "Saved TLS certificate for {nickname}"
            ),
            FleetEvent::PeerRemembered {
                identity,
                nickname,
                address,
            } => info!(peer = %identity, addr = %address, "Remembering {nickname}"),
            FleetEvent::TrustConflict {
                identity,
                pinned,
                offered,
                reported_by,
            } => warn!(
                peer = %identity,
                pinned = %hex::encode(pinned),
                offered = %hex::encode(offered),
                reported_by = %reported_by,
                "Certificate conflicts with pinned certificate; peer rejected"
            ),
            FleetEvent::TeacherUnreachable {
                identity,
                address,
                reason,
            } => match identity {
                Some(identity) => {
                    info!(peer = %identity, addr = %address, %reason, "Teacher unreachable")
                }
                None => info!(addr = %address, %reason, "Seed unreachable"),
            },
        }
    }
}

/// No-op publisher for testing.
#[derive(Debug, Default)]
pub struct NoOpEventPublisher {
    /// Count of published events (for testing verification).
    pub event_count: std::sync::atomic::AtomicUsize,
}

impl NoOpEventPublisher {
    /// Create a new no-op publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the count of published events.
    #[must_use]
    pub fn get_event_count(&self) -> usize {
        self.event_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl FleetEventPublisher for NoOpEventPublisher {
    fn publish(&self, _event: FleetEvent) {
        self.event_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// In-memory publisher for testing that stores events.
#[derive(Debug, Default)]
pub struct InMemoryEventPublisher {
    events: Mutex<Vec<FleetEvent>>,
}

impl InMemoryEventPublisher {
    /// Create a new in-memory publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published events.
    #[must_use]
    pub fn get_events(&self) -> Vec<FleetEvent> {
        self.events.lock().clone()
    }

    /// Identities whose certificate was saved, in order.
    #[must_use]
    pub fn certificates_saved(&self) -> Vec<PeerIdentity> {
        self.filter(|event| match event {
            FleetEvent::CertificateSaved { identity, .. } => Some(*identity),
            _ => None,
        })
    }

    /// Identities remembered, in order.
    #[must_use]
    pub fn remembered(&self) -> Vec<PeerIdentity> {
        self.filter(|event| match event {
            FleetEvent::PeerRemembered { identity, .. } => Some(*identity),
            _ => None,
        })
    }

    /// Identities involved in trust conflicts, in order.
    #[must_use]
    pub fn trust_conflicts(&self) -> Vec<PeerIdentity> {
        self.filter(|event| match event {
            FleetEvent::TrustConflict { identity, .. } => Some(*identity),
            _ => None,
        })
    }

    /// Clear all stored events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn filter(&self, pick: impl Fn(&FleetEvent) -> Option<PeerIdentity>) -> Vec<PeerIdentity> {
        self.events.lock().iter().filter_map(pick).collect()
    }
}

impl FleetEventPublisher for InMemoryEventPublisher {
    fn publish(&self, event: FleetEvent) {
        self.events.lock().push(event);
    }
}
