//! Production wiring: builds a [`WorkerRuntime`] from configuration.
//!
//! | Port | Adapter |
//! |------|---------|
//! | transport / advertiser | QUIC (`quinn` + `rustls`) |
//! | staking oracle | HTTP staking provider, or none in federated-only mode |
//! | external IP | HTTP "what is my IP" endpoint |
//! | storage | RocksDB (feature `rocksdb`), in-memory in dev mode |
//! | events | tracing |

use std::sync::Arc;

use fleet_discovery::adapters::StaticStakingOracle;
use fleet_discovery::{
    InMemoryKeyValueStore, KeyValueStore, NodeTlsMaterial, PeerIdentity, QuicConfig,
    QuicFleetServer, QuicPeerTransport, StakingOracle, SystemTimeSource, TracingEventPublisher,
};
use tracing::info;

use crate::adapters::{HttpAddressOracle, HttpStakingOracle, TlsMaterialStore};
use crate::config::{ConfigError, WorkerConfig};
use crate::errors::StartupError;
use crate::runtime::{Collaborators, WorkerRuntime};

/// Subject name of generated certificates when no host is configured.
const DEFAULT_CERTIFICATE_HOST: &str = "localhost";

/// Build the runtime with production adapters.
pub fn build_runtime(config: WorkerConfig) -> Result<WorkerRuntime, StartupError> {
    let identity = worker_identity(&config)?;

    let certificate_host = config
        .network
        .host
        .clone()
        .unwrap_or_else(|| DEFAULT_CERTIFICATE_HOST.to_string());
    let tls = if config.mode.dev {
        NodeTlsMaterial::generate(&certificate_host)?
    } else {
        TlsMaterialStore::new(config.storage.data_dir.join("tls")).load_or_generate(&certificate_host)?
    };
    let certificate = tls.certificate_der().to_vec();

    let server_config = QuicConfig {
        bind_addr: config.bind_addr()?,
        ..QuicConfig::default()
    };
    let server = Arc::new(QuicFleetServer::new(tls, server_config));
    let transport = Arc::new(QuicPeerTransport::bind(QuicConfig::default())?);

    let staking: Arc<dyn StakingOracle> = match &config.bonding.staking_provider_url {
        Some(url) => Arc::new(HttpStakingOracle::new(url.as_str())?),
        None => Arc::new(StaticStakingOracle::failing("no staking provider configured")),
    };

    let collaborators = Collaborators {
        transport,
        advertiser: server,
        staking,
        address_oracle: Arc::new(HttpAddressOracle::new(config.network.ip_oracle_url.as_str())?),
        store: open_store(&config)?,
        events: Arc::new(TracingEventPublisher::new()),
        clock: Arc::new(SystemTimeSource::new()),
    };

    Ok(WorkerRuntime::new(config, identity, certificate, collaborators))
}

fn worker_identity(config: &WorkerConfig) -> Result<PeerIdentity, StartupError> {
    match config.worker_identity()? {
        Some(identity) => Ok(identity),
        None if config.mode.dev => {
            let identity = PeerIdentity::new(rand::random());
            info!(worker = %identity, "Dev mode: using a random worker identity");
            Ok(identity)
        }
        None => Err(ConfigError::Inconsistent("a worker address is required outside dev mode".into()).into()),
    }
}

fn open_store(config: &WorkerConfig) -> Result<Arc<dyn KeyValueStore>, StartupError> {
    if config.mode.dev {
        info!("Dev mode: peers and certificates are kept in memory");
        return Ok(Arc::new(InMemoryKeyValueStore::new()));
    }
    open_persistent_store(config)
}

#[cfg(feature = "rocksdb")]
fn open_persistent_store(config: &WorkerConfig) -> Result<Arc<dyn KeyValueStore>, StartupError> {
    let path = config.storage.data_dir.join("fleet-db");
    let store = crate::adapters::RocksDbStore::open_default(&path)?;
    info!(path = %path.display(), "Opened RocksDB fleet store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "rocksdb"))]
fn open_persistent_store(_config: &WorkerConfig) -> Result<Arc<dyn KeyValueStore>, StartupError> {
    tracing::warn!("Built without the rocksdb feature: peers and certificates will not survive a restart");
    Ok(Arc::new(InMemoryKeyValueStore::new()))
}
