//! # Worker Runtime
//!
//! Runs the startup sequence of one worker against a set of collaborators:
//!
//! 1. Resolve the host to advertise (fatal on failure in public mode)
//! 2. Bonding gate (skipped in federated-only mode)
//! 3. Restore peers and pins from storage
//! 4. Serve fleet requests
//! 5. Start the learning loop (unless lonely)
//! 6. Start the bond watchdog (if enabled)
//!
//! Nothing is advertised before the bonding gate passes.

use std::sync::Arc;
use std::time::Duration;

use fleet_discovery::{
    resolve_advertised_host, AddressRequirement, BondingState, BondingStatus, BondingVerifier,
    ExternalAddressOracle, FleetAdvertiser, FleetContext, FleetEventPublisher, FleetResponder,
    KeyValueStore, LocalNode, NodeLearner, PeerIdentity, PeerTransport, SocketAddr,
    StakingOracle, TimeSource,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::errors::StartupError;

/// How long `shutdown` waits for background tasks.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Port implementations the runtime wires together.
#[derive(Clone)]
pub struct Collaborators {
    /// Outbound fleet requests.
    pub transport: Arc<dyn PeerTransport>,
    /// Inbound fleet requests.
    pub advertiser: Arc<dyn FleetAdvertiser>,
    /// Staking registry.
    pub staking: Arc<dyn StakingOracle>,
    /// External IP lookup.
    pub address_oracle: Arc<dyn ExternalAddressOracle>,
    /// Pins and peer records.
    pub store: Arc<dyn KeyValueStore>,
    /// Fleet event sink.
    pub events: Arc<dyn FleetEventPublisher>,
    /// Wall clock.
    pub clock: Arc<dyn TimeSource>,
}

/// A configured, not yet started worker.
pub struct WorkerRuntime {
    config: WorkerConfig,
    identity: PeerIdentity,
    certificate: Vec<u8>,
    collaborators: Collaborators,
}

impl WorkerRuntime {
    /// Create a runtime for `identity` serving `certificate`.
    pub fn new(
        config: WorkerConfig,
        identity: PeerIdentity,
        certificate: Vec<u8>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config,
            identity,
            certificate,
            collaborators,
        }
    }

    /// The worker identity.
    pub fn identity(&self) -> PeerIdentity {
        self.identity
    }

    /// Run the startup sequence.
    ///
    /// Any error is fatal: nothing has been advertised and no task is left
    /// running.
    pub async fn start(self) -> Result<RunningWorker, StartupError> {
        let Self {
            config,
            identity,
            certificate,
            collaborators,
        } = self;
        let mode = config.operating_mode();

        info!("===========================================");
        info!("  Fleet worker {}", identity.nickname());
        info!("===========================================");

        // Step 1: Self-addressing
        let requirement = if mode.requires_public_address() {
            AddressRequirement::Public
        } else {
            AddressRequirement::LoopbackAllowed
        };
        let host = resolve_advertised_host(
            config.host_ip()?,
            config.external_host_ip()?,
            collaborators.address_oracle.as_ref(),
            requirement,
        )
        .await?;
        let address = SocketAddr::new(host.ip, config.network.port);

        // Step 2: Bonding gate
        let verifier = BondingVerifier::new(collaborators.staking.clone(), &config.bonding_config());
        let bonding = if mode.requires_bonding() {
            let timeout = config.bonding_config().timeout;
            let started = Instant::now();
            let state = verifier.verify(identity, started + timeout).await;
            match state.status {
                BondingStatus::Bonded => Some(Arc::new(Mutex::new(state))),
                BondingStatus::Detached => {
                    return Err(StartupError::DetachedWorker { worker: identity })
                }
                BondingStatus::Pending | BondingStatus::TimedOut => {
                    return Err(StartupError::BondingTimedOut {
                        worker: identity,
                        waited: started.elapsed(),
                    })
                }
            }
        } else {
            info!("Federated-only mode: skipping bond verification");
            None
        };

        // Step 3: Fleet state
        let local = LocalNode::new(identity, address, certificate, mode);
        let context = Arc::new(FleetContext::new(
            local,
            collaborators.store.clone(),
            collaborators.events.clone(),
            collaborators.clock.clone(),
        ));
        let restored = context.restore()?;
        if restored > 0 {
            info!(peers = restored, "Restored known workers from storage");
        }

        let responder = Arc::new(FleetResponder::new(context.clone()));
        let learner = Arc::new(
            NodeLearner::new(
                context.clone(),
                collaborators.transport.clone(),
                config.learning_config(),
            )
            .with_seeds(config.seeds()?),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let mut worker = RunningWorker {
            context,
            learner: learner.clone(),
            address,
            bonding,
            shutdown_tx: shutdown_tx.clone(),
            shutdown_rx: shutdown_rx.clone(),
            tasks: Vec::new(),
            dry_run: config.mode.dry_run,
        };

        if worker.dry_run {
            info!(address = %address, "Dry run: worker configured, not serving");
            return Ok(worker);
        }

        // Step 4: Serve
        collaborators
            .advertiser
            .advertise(address, responder, shutdown_rx.clone())?;

        // Step 5: Learn
        if mode.lonely {
            info!("Lonely mode: not learning about other workers");
        } else {
            worker
                .tasks
                .push(tokio::spawn(learner.run(shutdown_rx.clone())));
        }

        // Step 6: Bond watchdog
        if let (Some(interval), Some(state)) = (config.watchdog_interval(), &worker.bonding) {
            worker.tasks.push(tokio::spawn(bond_watchdog(
                verifier,
                state.clone(),
                interval,
                shutdown_tx,
                shutdown_rx,
            )));
        }

        info!("Running worker {} on {}", identity.nickname(), address);
        Ok(worker)
    }
}

/// Periodically re-check the bond; shut the worker down once detached.
async fn bond_watchdog(
    verifier: BondingVerifier,
    state: Arc<Mutex<BondingState>>,
    interval: Duration,
    shutdown_tx: Arc<watch::Sender<bool>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }

        let mut current = state.lock().clone();
        match verifier.recheck(&mut current).await {
            Ok(BondingStatus::Detached) => {
                let worker = current.worker_identity;
                *state.lock() = current;
                error!(worker = %worker, "Worker was detached from its staker; shutting down");
                shutdown_tx.send_replace(true);
                break;
            }
            Ok(_) => *state.lock() = current,
            Err(error) => warn!(%error, "Bond re-check failed; keeping current status"),
        }
    }
}

/// A started worker.
pub struct RunningWorker {
    context: Arc<FleetContext>,
    learner: Arc<NodeLearner>,
    address: SocketAddr,
    bonding: Option<Arc<Mutex<BondingState>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
    dry_run: bool,
}

impl RunningWorker {
    /// Shared fleet state.
    pub fn context(&self) -> &Arc<FleetContext> {
        &self.context
    }

    /// The learner.
    pub fn learner(&self) -> &Arc<NodeLearner> {
        &self.learner
    }

    /// Advertised address.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Current bonding status; `None` in federated-only mode.
    pub fn bonding_status(&self) -> Option<BondingStatus> {
        self.bonding.as_ref().map(|state| state.lock().status)
    }

    /// Whether startup stopped short of serving.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Receiver that flips to `true` when the worker stops itself.
    pub fn stopped(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Signal every task to stop and wait for them.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        self.shutdown_tx.send_replace(true);

        for task in self.tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => error!(%error, "Worker task failed"),
                Err(_) => warn!("Worker task did not stop in time"),
            }
        }
        info!("Shutdown complete");
    }
}
