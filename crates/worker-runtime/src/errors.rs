//! Startup errors.

use std::time::Duration;

use fleet_discovery::{
    AddressResolutionError, OracleError, PeerIdentity, StoreError, TransportError,
};
use thiserror::Error;

use crate::config::ConfigError;

/// Why a worker failed to start. Every variant is fatal.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The staking oracle reports the worker as unbonded from its staker.
    #[error("worker {worker} is detached from its staking provider")]
    DetachedWorker {
        /// This worker.
        worker: PeerIdentity,
    },

    /// No bond appeared before the deadline.
    #[error("worker {worker} was not bonded within {waited:?}")]
    BondingTimedOut {
        /// This worker.
        worker: PeerIdentity,
        /// How long startup waited.
        waited: Duration,
    },

    /// The host to advertise could not be determined.
    #[error(transparent)]
    AddressResolution(#[from] AddressResolutionError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Peer or certificate storage failed.
    #[error("storage: {0}")]
    Storage(#[from] StoreError),

    /// The fleet server or client could not be set up.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// An HTTP oracle could not be constructed.
    #[error("oracle: {0}")]
    Oracle(#[from] OracleError),
}
