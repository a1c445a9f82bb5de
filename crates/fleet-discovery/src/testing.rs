//! Centralized Testing Utilities
//!
//! Clocks, fixtures and an in-process worker harness used across the crate
//! and by the workspace test suite. Available with the `test-utils` feature.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::adapters::{InMemoryEventPublisher, InMemoryKeyValueStore, LocalNetwork};
use crate::domain::{
    IpAddr, LearningConfig, LocalNode, OperatingMode, PeerIdentity, PeerRecord, SocketAddr,
    Timestamp,
};
use crate::ports::TimeSource;
use crate::service::{FleetContext, FleetResponder, NodeLearner};

/// Thread-safe TimeSource for tests requiring time advancement.
///
/// # Example
///
/// ```rust
/// use fleet_discovery::testing::ManualTimeSource;
/// use fleet_discovery::ports::TimeSource;
///
/// let time = ManualTimeSource::new(1000);
/// time.advance(5);
/// assert_eq!(time.now().as_secs(), 1005);
/// ```
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    time: AtomicU64,
}

impl ManualTimeSource {
    /// Clock starting at `initial` Unix seconds.
    pub fn new(initial: u64) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    /// Advances the clock by `secs`.
    pub fn advance(&self, secs: u64) {
        self.time.fetch_add(secs, Ordering::SeqCst);
    }

    /// Sets the clock to `secs`.
    pub fn set(&self, secs: u64) {
        self.time.store(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.time.load(Ordering::SeqCst))
    }
}

/// Deterministic identity for fixture worker `index`.
pub fn test_identity(index: u8) -> PeerIdentity {
    PeerIdentity::derive(&[b'w', index])
}

/// Deterministic stand-in certificate bytes for fixture worker `index`.
pub fn test_certificate(index: u8) -> Vec<u8> {
    format!("test certificate for worker {index}").into_bytes()
}

/// Publicly routable fixture address for worker `index`.
pub fn public_address(index: u8) -> SocketAddr {
    SocketAddr::new(IpAddr::v4(45, 76, 10, index), 9151)
}

/// Loopback fixture address for dev-mode worker `index`.
pub fn loopback_address(index: u8) -> SocketAddr {
    SocketAddr::new(IpAddr::loopback(), 10_100 + u16::from(index))
}

/// A complete in-process worker wired to a [`LocalNetwork`].
pub struct TestWorker {
    /// Shared context.
    pub ctx: Arc<FleetContext>,
    /// Learning capability.
    pub learner: Arc<NodeLearner>,
    /// Serving capability, registered on the network.
    pub responder: Arc<FleetResponder>,
    /// Captured events.
    pub events: Arc<InMemoryEventPublisher>,
    /// Backing store.
    pub store: Arc<InMemoryKeyValueStore>,
}

impl TestWorker {
    /// Build worker `index` and register its responder on `network`.
    ///
    /// Dev-mode workers serve on loopback, others on a public fixture address.
    pub fn start(
        network: &LocalNetwork,
        index: u8,
        mode: OperatingMode,
        clock: Arc<ManualTimeSource>,
        config: LearningConfig,
    ) -> Self {
        let address = if mode.dev {
            loopback_address(index)
        } else {
            public_address(index)
        };
        let local = LocalNode::new(test_identity(index), address, test_certificate(index), mode);
        Self::with_local(network, local, clock, config)
    }

    /// Build a worker around an explicit [`LocalNode`].
    pub fn with_local(
        network: &LocalNetwork,
        local: LocalNode,
        clock: Arc<ManualTimeSource>,
        config: LearningConfig,
    ) -> Self {
        let address = local.address;
        let store = Arc::new(InMemoryKeyValueStore::new());
        let events = Arc::new(InMemoryEventPublisher::new());
        let ctx = Arc::new(FleetContext::new(local, store.clone(), events.clone(), clock));
        let learner = Arc::new(NodeLearner::new(ctx.clone(), Arc::new(network.clone()), config));
        let responder = Arc::new(FleetResponder::new(ctx.clone()));
        network.register(address, responder.clone());
        Self {
            ctx,
            learner,
            responder,
            events,
            store,
        }
    }

    /// Identity of this worker.
    pub fn identity(&self) -> PeerIdentity {
        self.ctx.local().identity
    }

    /// Address this worker serves on.
    pub fn address(&self) -> SocketAddr {
        self.ctx.local().address
    }

    /// How another worker would record this one before contacting it.
    pub fn as_teacher(&self) -> PeerRecord {
        let local = self.ctx.local();
        PeerRecord::new(local.identity, local.address, local.fingerprint, self.ctx.now())
    }

    /// Whether this worker knows `identity`.
    pub fn knows(&self, identity: &PeerIdentity) -> bool {
        self.ctx.registry().get(identity).is_some()
    }
}
