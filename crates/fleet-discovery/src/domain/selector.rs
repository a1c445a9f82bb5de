//! Teacher selection.
//!
//! Preference order: verified peers by oldest `last_seen`, then unknown peers
//! by oldest `last_seen`, then unreachable peers by fewest failures. Peers
//! picked within the cool-down window are skipped unless nothing else is
//! eligible.

use std::collections::HashMap;
use std::time::Duration;

use super::entities::{PeerRecord, PeerStatus, Timestamp};
use super::identity::PeerIdentity;

/// Result of a selection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeacherSelection {
    /// Contact this peer next.
    Selected(PeerRecord),
    /// Every eligible peer was picked too recently; try again later.
    CoolingDown,
    /// No eligible peer exists.
    NoTeacherAvailable,
}

/// Picks the next teacher and remembers when each peer was last picked.
#[derive(Debug, Clone)]
pub struct TeacherSelector {
    cooldown: Duration,
    last_selected: HashMap<PeerIdentity, Timestamp>,
}

impl TeacherSelector {
    /// Selector that skips peers picked less than `cooldown` ago.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_selected: HashMap::new(),
        }
    }

    /// Choose a teacher from `peers`.
    pub fn select(
        &mut self,
        peers: &[PeerRecord],
        self_identity: &PeerIdentity,
        now: Timestamp,
    ) -> TeacherSelection {
        let mut eligible: Vec<&PeerRecord> = peers
            .iter()
            .filter(|p| p.identity != *self_identity && p.status != PeerStatus::Detached)
            .collect();

        if eligible.is_empty() {
            return TeacherSelection::NoTeacherAvailable;
        }

        eligible.sort_by_key(|p| preference_key(p));

        let chosen = if eligible.len() == 1 {
            Some(eligible[0])
        } else {
            eligible.iter().copied().find(|p| !self.is_cooling_down(p, now))
        };

        match chosen {
            Some(teacher) => {
                self.last_selected.insert(teacher.identity, now);
                TeacherSelection::Selected(teacher.clone())
            }
            None => TeacherSelection::CoolingDown,
        }
    }

    fn is_cooling_down(&self, peer: &PeerRecord, now: Timestamp) -> bool {
        self.last_selected
            .get(&peer.identity)
            .is_some_and(|picked| now.secs_since(*picked) < self.cooldown.as_secs())
    }
}

/// Sort key: status class, failures, oldest sighting, identity as a stable tie-break.
type PreferenceKey = (u8, u32, Timestamp, PeerIdentity);

fn preference_key(peer: &PeerRecord) -> PreferenceKey {
    let (class, failures) = match peer.status {
        PeerStatus::Verified => (0, 0),
        PeerStatus::Unknown => (1, 0),
        PeerStatus::Unreachable => (2, peer.failure_count),
        PeerStatus::Detached => (3, u32::MAX),
    };
    (class, failures, peer.last_seen, peer.identity)
}
