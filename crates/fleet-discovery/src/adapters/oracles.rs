//! Fixture oracles.
//!
//! Deterministic stand-ins for the staking chain and the external-IP
//! service. The HTTP-backed oracles live in the runtime crate.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{BondObservation, IpAddr, OracleError, PeerIdentity};
use crate::ports::{ExternalAddressOracle, StakingOracle};

/// Staking oracle answering every worker with one settable observation.
#[derive(Debug)]
pub struct StaticStakingOracle {
    answer: Mutex<Result<BondObservation, OracleError>>,
    calls: AtomicUsize,
}

impl StaticStakingOracle {
    /// Oracle that always reports `observation`.
    pub fn new(observation: BondObservation) -> Self {
        Self {
            answer: Mutex::new(Ok(observation)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Oracle that always fails.
    pub fn failing(reason: &str) -> Self {
        Self {
            answer: Mutex::new(Err(OracleError::Unavailable(reason.to_string()))),
            calls: AtomicUsize::new(0),
        }
    }

    /// Change the answer for subsequent queries.
    pub fn set(&self, observation: BondObservation) {
        *self.answer.lock() = Ok(observation);
    }

    /// Number of queries so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StakingOracle for StaticStakingOracle {
    async fn is_worker_bonded(
        &self,
        _worker: &PeerIdentity,
    ) -> Result<BondObservation, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().clone()
    }
}

/// External-IP oracle returning a fixed address.
#[derive(Debug)]
pub struct FixedAddressOracle {
    ip: IpAddr,
    calls: AtomicUsize,
}

impl FixedAddressOracle {
    /// Oracle reporting `ip`.
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of queries so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalAddressOracle for FixedAddressOracle {
    async fn external_ip(&self) -> Result<IpAddr, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ip)
    }
}

/// External-IP oracle that is always unavailable.
#[derive(Debug, Clone)]
pub struct FailingAddressOracle {
    reason: String,
}

impl FailingAddressOracle {
    /// Oracle failing with `reason`.
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ExternalAddressOracle for FailingAddressOracle {
    async fn external_ip(&self) -> Result<IpAddr, OracleError> {
        Err(OracleError::Unavailable(self.reason.clone()))
    }
}
