//! # Production Wiring Tests
//!
//! Builds workers with the real QUIC transport in dev mode and checks that
//! they serve, learn and stop.

use std::time::Duration;

use fleet_discovery::{FleetLearningApi, IpAddr, PeerIdentity};
use worker_runtime::{build_runtime, WorkerConfig};

fn dev_config() -> WorkerConfig {
    let mut config = WorkerConfig::default();
    config.mode.dev = true;
    config.mode.federated_only = true;
    config.network.port = 0;
    config.network.bind = Some("127.0.0.1:0".into());
    config
}

#[tokio::test]
async fn test_dev_worker_gets_random_identity() {
    let first = build_runtime(dev_config()).unwrap();
    let second = build_runtime(dev_config()).unwrap();
    assert_ne!(first.identity(), second.identity());
}

#[tokio::test]
async fn test_configured_identity_is_used() {
    let mut config = dev_config();
    config.identity.worker_address = Some("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".into());
    let runtime = build_runtime(config).unwrap();
    assert_eq!(
        runtime.identity(),
        PeerIdentity::parse("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap()
    );
}

#[tokio::test]
async fn test_missing_identity_outside_dev_is_rejected() {
    let mut config = dev_config();
    let data_dir = tempfile::tempdir().unwrap();
    config.mode.dev = false;
    config.storage.data_dir = data_dir.path().to_path_buf();
    assert!(build_runtime(config).is_err());
}

#[tokio::test]
async fn test_lonely_dev_worker_starts_and_stops() {
    let mut config = dev_config();
    config.mode.lonely = true;
    let worker = build_runtime(config).unwrap().start().await.unwrap();

    assert_eq!(worker.address().ip, IpAddr::loopback());
    assert!(worker.learner().known_peers().is_empty());
    assert!(!*worker.stopped().borrow());

    tokio::time::timeout(Duration::from_secs(10), worker.shutdown())
        .await
        .unwrap();
}
