//! Bonding lifecycle of the local worker.
//!
//! ```text
//! Pending ──bonded──► Bonded ──unbonded/detached──► Detached
//!    │                                                 ▲
//!    ├──detached───────────────────────────────────────┘
//!    └──deadline────► TimedOut
//! ```
//!
//! `Detached` and `TimedOut` are terminal.

use tokio::time::Instant;

use super::errors::BondingTransitionError;
use super::identity::PeerIdentity;

/// Current bonding status of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondingStatus {
    /// Waiting for a staking identity to bond the worker.
    Pending,
    /// Bonded to a staking identity; participation allowed.
    Bonded,
    /// Was bonded (or flagged detached) and is no longer.
    Detached,
    /// The deadline passed while pending.
    TimedOut,
}

impl BondingStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BondingStatus::Detached | BondingStatus::TimedOut)
    }
}

/// One answer from the staking oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BondObservation {
    /// No staking identity currently bonds the worker.
    Unbonded,
    /// Bonded to the given staking identity.
    Bonded(PeerIdentity),
    /// The worker was bonded in the past and has since been released.
    Detached,
}

/// Bonding state of one worker against one deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondingState {
    /// The worker being verified.
    pub worker_identity: PeerIdentity,
    /// Staking identity, present exactly when the worker is or was bonded.
    pub staking_identity: Option<PeerIdentity>,
    /// Lifecycle position.
    pub status: BondingStatus,
    /// Point after which a pending worker times out.
    pub deadline: Instant,
}

impl BondingState {
    /// Fresh pending state.
    pub fn pending(worker_identity: PeerIdentity, deadline: Instant) -> Self {
        Self {
            worker_identity,
            staking_identity: None,
            status: BondingStatus::Pending,
            deadline,
        }
    }

    /// Move to `Bonded`. Re-bonding to a different staker updates the staker.
    pub fn bond(&mut self, staker: PeerIdentity) -> Result<(), BondingTransitionError> {
        self.guard(BondingStatus::Bonded)?;
        self.staking_identity = Some(staker);
        self.status = BondingStatus::Bonded;
        Ok(())
    }

    /// Move to `Detached`.
    pub fn detach(&mut self) -> Result<(), BondingTransitionError> {
        self.guard(BondingStatus::Detached)?;
        self.status = BondingStatus::Detached;
        Ok(())
    }

    /// Move `Pending` to `TimedOut`.
    pub fn time_out(&mut self) -> Result<(), BondingTransitionError> {
        if self.status != BondingStatus::Pending {
            return Err(BondingTransitionError::NotPending { from: self.status });
        }
        self.status = BondingStatus::TimedOut;
        Ok(())
    }

    /// Apply an oracle answer and return the resulting status.
    ///
    /// An `Unbonded` answer keeps a pending worker pending but detaches a
    /// bonded one.
    pub fn apply(
        &mut self,
        observation: &BondObservation,
    ) -> Result<BondingStatus, BondingTransitionError> {
        match observation {
            BondObservation::Bonded(staker) => self.bond(*staker)?,
            BondObservation::Detached => self.detach()?,
            BondObservation::Unbonded => match self.status {
                BondingStatus::Pending => {}
                BondingStatus::Bonded => self.detach()?,
                from => {
                    return Err(BondingTransitionError::Terminal {
                        from,
                        to: BondingStatus::Pending,
                    })
                }
            },
        }
        Ok(self.status)
    }

    /// Whether the worker may serve and learn.
    pub fn permits_participation(&self) -> bool {
        self.status == BondingStatus::Bonded
    }

    fn guard(&self, to: BondingStatus) -> Result<(), BondingTransitionError> {
        if self.status.is_terminal() {
            return Err(BondingTransitionError::Terminal {
                from: self.status,
                to,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker() -> PeerIdentity {
        PeerIdentity::new([1u8; 20])
    }

    fn staker() -> PeerIdentity {
        PeerIdentity::new([2u8; 20])
    }

    #[test]
    fn test_pending_to_bonded_records_staker() {
        let mut state = BondingState::pending(worker(), Instant::now());
        assert_eq!(
            state.apply(&BondObservation::Bonded(staker())),
            Ok(BondingStatus::Bonded)
        );
        assert_eq!(state.staking_identity, Some(staker()));
        assert!(state.permits_participation());
    }

    #[test]
    fn test_unbonded_keeps_pending() {
        let mut state = BondingState::pending(worker(), Instant::now());
        assert_eq!(
            state.apply(&BondObservation::Unbonded),
            Ok(BondingStatus::Pending)
        );
        assert!(!state.permits_participation());
    }

    #[test]
    fn test_bonded_then_unbonded_detaches() {
        let mut state = BondingState::pending(worker(), Instant::now());
        state.bond(staker()).unwrap();
        assert_eq!(
            state.apply(&BondObservation::Unbonded),
            Ok(BondingStatus::Detached)
        );
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut detached = BondingState::pending(worker(), Instant::now());
        detached.detach().unwrap();
        assert!(detached.bond(staker()).is_err());
        assert!(detached.time_out().is_err());
        assert_eq!(detached.status, BondingStatus::Detached);

        let mut timed_out = BondingState::pending(worker(), Instant::now());
        timed_out.time_out().unwrap();
        assert!(timed_out.apply(&BondObservation::Bonded(staker())).is_err());
        assert_eq!(timed_out.status, BondingStatus::TimedOut);
    }

    #[test]
    fn test_only_pending_times_out() {
        let mut state = BondingState::pending(worker(), Instant::now());
        state.bond(staker()).unwrap();
        assert_eq!(
            state.time_out(),
            Err(BondingTransitionError::NotPending {
                from: BondingStatus::Bonded
            })
        );
    }
}
