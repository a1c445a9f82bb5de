//! # Bonding Verifier
//!
//! Polls the staking oracle until the worker is bonded, detached, or the
//! deadline passes. Oracle failures are transient; only the deadline ends a
//! pending wait.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{BondingConfig, BondingState, BondingStatus, OracleError, PeerIdentity};
use crate::ports::StakingOracle;

/// Gatekeeper for participation: is this worker bonded to a staker?
pub struct BondingVerifier {
    oracle: Arc<dyn StakingOracle>,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl BondingVerifier {
    /// Create a verifier polling `oracle` with the backoff from `config`.
    pub fn new(oracle: Arc<dyn StakingOracle>, config: &BondingConfig) -> Self {
        Self {
            oracle,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff.max(config.initial_backoff),
        }
    }

    /// Wait for `worker` to become bonded, or give up at `deadline`.
    ///
    /// Returns a state that is `Bonded`, `Detached` or `TimedOut`. Each
    /// oracle call is bounded by the time remaining, so this never runs
    /// meaningfully past `deadline`.
    pub async fn verify(&self, worker: PeerIdentity, deadline: Instant) -> BondingState {
        let mut state = BondingState::pending(worker, deadline);
        let mut backoff = self.initial_backoff;
        info!(worker = %worker, "Waiting for worker to be bonded to a staking provider");

        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()).filter(|d| !d.is_zero()) else {
                break;
            };

            match tokio::time::timeout(remaining, self.oracle.is_worker_bonded(&worker)).await {
                Ok(Ok(observation)) => match state.apply(&observation) {
                    Ok(BondingStatus::Pending) => {
                        debug!(worker = %worker, ?backoff, "Worker not bonded yet");
                    }
                    Ok(status) => {
                        log_settled(&state, status);
                        return state;
                    }
                    Err(error) => {
                        warn!(worker = %worker, %error, "Ignoring bonding observation");
                    }
                },
                Ok(Err(error)) => {
                    warn!(worker = %worker, %error, "Staking oracle query failed; retrying");
                }
                Err(_) => {
                    debug!(worker = %worker, "Staking oracle query timed out");
                    break;
                }
            }

            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            tokio::time::sleep(backoff.min(remaining)).await;
            backoff = (backoff * 2).min(self.max_backoff);
        }

        if state.time_out().is_ok() {
            warn!(worker = %worker, "Timed out waiting for worker to be bonded");
        }
        state
    }

    /// Re-query the oracle for an already-verified worker.
    ///
    /// A bonded worker that is now unbonded or detached moves to
    /// `Detached`. Oracle failures leave the state untouched.
    pub async fn recheck(&self, state: &mut BondingState) -> Result<BondingStatus, OracleError> {
        if state.status.is_terminal() {
            return Ok(state.status);
        }
        let observation = self.oracle.is_worker_bonded(&state.worker_identity).await?;
        match state.apply(&observation) {
            Ok(status) => {
                if status == BondingStatus::Detached {
                    warn!(worker = %state.worker_identity, "Worker is no longer bonded");
                }
                Ok(status)
            }
            Err(error) => {
                warn!(worker = %state.worker_identity, %error, "Ignoring bonding observation");
                Ok(state.status)
            }
        }
    }
}

fn log_settled(state: &BondingState, status: BondingStatus) {
    match (status, state.staking_identity) {
        (BondingStatus::Bonded, Some(staker)) => {
            info!(worker = %state.worker_identity, staker = %staker, "Worker is bonded")
        }
        _ => warn!(worker = %state.worker_identity, ?status, "Worker is not eligible to run"),
    }
}
