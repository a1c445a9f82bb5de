//! At most one fleet request in flight per teacher address.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::{LearnError, SocketAddr};

use super::LearnResult;

type Shared = Option<Result<LearnResult, LearnError>>;

enum Role {
    Leader(watch::Sender<Shared>),
    Follower(watch::Receiver<Shared>),
}

/// Registry of in-flight requests keyed by target address.
#[derive(Default)]
pub(crate) struct InFlight {
    targets: Mutex<HashMap<SocketAddr, watch::Receiver<Shared>>>,
}

impl InFlight {
    /// Run `fetch` for `address`, or wait for the request already running.
    ///
    /// Followers receive a clone of the leader's result. If the leader is
    /// dropped before finishing, followers get [`LearnError::Cancelled`].
    pub(crate) async fn run<F, Fut>(&self, address: SocketAddr, fetch: F) -> Result<LearnResult, LearnError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LearnResult, LearnError>>,
    {
        let role = {
            let mut targets = self.targets.lock();
            match targets.get(&address) {
                Some(receiver) => Role::Follower(receiver.clone()),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    targets.insert(address, receiver);
                    Role::Leader(sender)
                }
            }
        };

        match role {
            Role::Follower(mut receiver) => {
                let outcome = receiver
                    .wait_for(Option::is_some)
                    .await
                    .map_err(|_| LearnError::Cancelled)?
                    .clone();
                outcome.unwrap_or(Err(LearnError::Cancelled))
            }
            Role::Leader(sender) => {
                let _slot = Slot {
                    targets: &self.targets,
                    address,
                };
                let result = fetch().await;
                sender.send_replace(Some(result.clone()));
                result
            }
        }
    }

    /// Number of targets currently being contacted.
    pub(crate) fn len(&self) -> usize {
        self.targets.lock().len()
    }
}

/// Removes the in-flight entry when the leader finishes or is cancelled.
struct Slot<'a> {
    targets: &'a Mutex<HashMap<SocketAddr, watch::Receiver<Shared>>>,
    address: SocketAddr,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.targets.lock().remove(&self.address);
    }
}
