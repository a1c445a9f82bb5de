//! # Startup Gate Scenarios
//!
//! The runtime must refuse to serve until bonded, and must never invent an
//! address when it is required to advertise a public one.
//!
//! 4. An oracle that never reports a bond fails startup at the deadline
//!    with nothing advertised
//! 5. A failing IP oracle is fatal in public mode; configured hosts and
//!    oracle answers are otherwise advertised as given

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    use fleet_discovery::adapters::{
        FailingAddressOracle, FixedAddressOracle, InMemoryEventPublisher, LocalNetwork,
        StaticStakingOracle,
    };
    use fleet_discovery::testing::{test_certificate, test_identity, ManualTimeSource};
    use fleet_discovery::{
        AddressResolutionError, BondObservation, BondingConfig, BondingStatus, BondingVerifier,
        ExternalAddressOracle, InMemoryKeyValueStore, IpAddr, OracleError, PeerIdentity,
        SocketAddr, StakingOracle,
    };
    use worker_runtime::{Collaborators, StartupError, WorkerConfig, WorkerRuntime};

    const NOW: u64 = 1_700_000_000;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    /// Staking oracle that never answers.
    #[derive(Default)]
    struct SilentStakingOracle {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StakingOracle for SilentStakingOracle {
        async fn is_worker_bonded(
            &self,
            _worker: &PeerIdentity,
        ) -> Result<BondObservation, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    /// Staking oracle replaying a script; the last answer repeats.
    struct ScriptedStakingOracle {
        script: Mutex<VecDeque<BondObservation>>,
        calls: AtomicUsize,
    }

    impl ScriptedStakingOracle {
        fn new(script: Vec<BondObservation>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StakingOracle for ScriptedStakingOracle {
        async fn is_worker_bonded(
            &self,
            _worker: &PeerIdentity,
        ) -> Result<BondObservation, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock();
            let next = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            next.ok_or_else(|| OracleError::Unavailable("script exhausted".into()))
        }
    }

    fn public_host() -> Arc<dyn ExternalAddressOracle> {
        Arc::new(FixedAddressOracle::new(IpAddr::v4(45, 76, 40, 1)))
    }

    fn collaborators(
        network: &LocalNetwork,
        staking: Arc<dyn StakingOracle>,
        address_oracle: Arc<dyn ExternalAddressOracle>,
    ) -> Collaborators {
        Collaborators {
            transport: Arc::new(network.clone()),
            advertiser: Arc::new(network.clone()),
            staking,
            address_oracle,
            store: Arc::new(InMemoryKeyValueStore::new()),
            events: Arc::new(InMemoryEventPublisher::new()),
            clock: Arc::new(ManualTimeSource::new(NOW)),
        }
    }

    /// Public-mode config with a one-second bonding deadline.
    fn gated_config() -> WorkerConfig {
        let mut config = WorkerConfig::default();
        config.bonding.staking_provider_url = Some("https://staking.invalid".into());
        config.bonding.timeout_secs = 1;
        config.bonding.initial_backoff_secs = 1;
        config
    }

    fn runtime(config: WorkerConfig, collaborators: Collaborators) -> WorkerRuntime {
        WorkerRuntime::new(config, test_identity(1), test_certificate(1), collaborators)
    }

    fn advertised() -> SocketAddr {
        SocketAddr::new(IpAddr::v4(45, 76, 40, 1), 9151)
    }

    // =========================================================================
    // SCENARIO 4: BONDING DEADLINE
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_unbonded_worker_fails_startup_without_advertising() {
        let network = LocalNetwork::new();
        let staking = Arc::new(StaticStakingOracle::new(BondObservation::Unbonded));
        let started = Instant::now();

        let result = runtime(gated_config(), collaborators(&network, staking, public_host()))
            .start()
            .await;

        assert!(matches!(
            result,
            Err(StartupError::BondingTimedOut { worker, .. }) if worker == test_identity(1)
        ));
        assert!(started.elapsed() <= Duration::from_millis(1100));
        assert!(!network.is_registered(&advertised()));
        assert_eq!(network.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_oracle_cannot_hold_startup_past_deadline() {
        let network = LocalNetwork::new();
        let staking = Arc::new(SilentStakingOracle::default());
        let started = Instant::now();

        let result = runtime(gated_config(), collaborators(&network, staking.clone(), public_host()))
            .start()
            .await;

        assert!(matches!(result, Err(StartupError::BondingTimedOut { .. })));
        assert!(started.elapsed() <= Duration::from_millis(1100));
        assert_eq!(staking.calls.load(Ordering::SeqCst), 1);
        assert!(!network.is_registered(&advertised()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_observation_is_final_within_one_verification() {
        let oracle = Arc::new(ScriptedStakingOracle::new(vec![
            BondObservation::Unbonded,
            BondObservation::Detached,
            BondObservation::Bonded(test_identity(50)),
        ]));
        let verifier = BondingVerifier::new(oracle.clone(), &BondingConfig::default());

        let state = verifier
            .verify(test_identity(1), Instant::now() + Duration::from_secs(60))
            .await;

        assert_eq!(state.status, BondingStatus::Detached);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_bond_within_deadline_starts_worker() {
        let network = LocalNetwork::new();
        let staking = Arc::new(ScriptedStakingOracle::new(vec![
            BondObservation::Unbonded,
            BondObservation::Unbonded,
            BondObservation::Bonded(test_identity(50)),
        ]));
        let mut config = gated_config();
        config.bonding.timeout_secs = 30;

        let worker = runtime(config, collaborators(&network, staking, public_host()))
            .start()
            .await
            .unwrap();

        assert_eq!(worker.bonding_status(), Some(BondingStatus::Bonded));
        assert!(network.is_registered(&advertised()));
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_federated_worker_skips_bonding() {
        let network = LocalNetwork::new();
        let staking = Arc::new(SilentStakingOracle::default());
        let mut config = gated_config();
        config.mode.federated_only = true;
        config.mode.lonely = true;

        let worker = runtime(config, collaborators(&network, staking.clone(), public_host()))
            .start()
            .await
            .unwrap();

        assert_eq!(worker.bonding_status(), None);
        assert_eq!(staking.calls.load(Ordering::SeqCst), 0);
        assert!(network.is_registered(&advertised()));
        worker.shutdown().await;
    }

    // =========================================================================
    // SCENARIO 5: SELF-ADDRESSING
    // =========================================================================

    #[tokio::test]
    async fn test_ip_oracle_failure_is_fatal_in_public_mode() {
        let network = LocalNetwork::new();
        let staking = Arc::new(StaticStakingOracle::new(BondObservation::Bonded(test_identity(50))));

        let result = runtime(
            gated_config(),
            collaborators(
                &network,
                staking.clone(),
                Arc::new(FailingAddressOracle::new("connection refused")),
            ),
        )
        .start()
        .await;

        match result {
            Err(StartupError::AddressResolution(AddressResolutionError::UnknownIpAddress {
                reason,
            })) => assert!(reason.contains("connection refused")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(worker) => panic!("worker started on {}", worker.address()),
        }
        assert_eq!(staking.calls(), 0);
        assert_eq!(network.request_count(), 0);
    }

    #[tokio::test]
    async fn test_dev_mode_falls_back_to_loopback() {
        let network = LocalNetwork::new();
        let mut config = gated_config();
        config.mode.dev = true;
        config.mode.federated_only = true;
        config.mode.lonely = true;

        let worker = runtime(
            config,
            collaborators(
                &network,
                Arc::new(StaticStakingOracle::failing("unused")),
                Arc::new(FailingAddressOracle::new("offline")),
            ),
        )
        .start()
        .await
        .unwrap();

        assert_eq!(worker.address().ip, IpAddr::loopback());
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_configured_private_host_is_advertised_as_given() {
        let network = LocalNetwork::new();
        let staking = Arc::new(StaticStakingOracle::new(BondObservation::Bonded(test_identity(50))));
        let oracle = Arc::new(FailingAddressOracle::new("unused"));
        let mut config = gated_config();
        config.network.host = Some("192.168.1.20".into());

        let worker = runtime(config, collaborators(&network, staking, oracle))
            .start()
            .await
            .unwrap();

        let expected = SocketAddr::new(IpAddr::v4(192, 168, 1, 20), 9151);
        assert_eq!(worker.address(), expected);
        assert!(network.is_registered(&expected));
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_documentation_address_from_oracle_is_advertised() {
        let network = LocalNetwork::new();
        let staking = Arc::new(StaticStakingOracle::new(BondObservation::Bonded(test_identity(50))));

        let worker = runtime(
            gated_config(),
            collaborators(
                &network,
                staking,
                Arc::new(FixedAddressOracle::new(IpAddr::v4(192, 0, 2, 0))),
            ),
        )
        .start()
        .await
        .unwrap();

        assert_eq!(worker.address(), SocketAddr::new(IpAddr::v4(192, 0, 2, 0), 9151));
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_loopback_from_oracle_is_rejected_in_public_mode() {
        let network = LocalNetwork::new();
        let staking = Arc::new(StaticStakingOracle::new(BondObservation::Bonded(test_identity(50))));

        let result = runtime(
            gated_config(),
            collaborators(
                &network,
                staking,
                Arc::new(FixedAddressOracle::new(IpAddr::loopback())),
            ),
        )
        .start()
        .await;

        assert!(matches!(
            result,
            Err(StartupError::AddressResolution(AddressResolutionError::Unroutable(_)))
        ));
        assert_eq!(network.request_count(), 0);
    }
}
