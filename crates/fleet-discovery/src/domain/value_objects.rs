//! Value objects: tuning knobs and operating mode.

use std::time::Duration;

/// Learning loop configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningConfig {
    /// Delay between rounds while the fleet is still being discovered.
    pub short_delay: Duration,
    /// Delay once rounds stop producing news.
    pub long_delay: Duration,
    /// Consecutive empty rounds before switching to `long_delay`.
    pub rounds_before_slowdown: u32,
    /// Minimum gap before the same teacher is asked again.
    pub teacher_cooldown: Duration,
    /// Upper bound on a single fleet request.
    pub request_timeout: Duration,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            short_delay: Duration::from_secs(5),
            long_delay: Duration::from_secs(90),
            rounds_before_slowdown: 10,
            teacher_cooldown: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl LearningConfig {
    /// Create a config suitable for testing (short delays, no cool-down).
    pub fn for_testing() -> Self {
        Self {
            short_delay: Duration::from_millis(100),
            long_delay: Duration::from_secs(1),
            rounds_before_slowdown: 3,
            teacher_cooldown: Duration::ZERO,
            request_timeout: Duration::from_secs(2),
        }
    }
}

/// Bond polling configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondingConfig {
    /// Total time a pending worker may wait for its bond.
    pub timeout: Duration,
    /// First gap between unbonded answers.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl Default for BondingConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Operating mode flags of the local node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatingMode {
    /// Skip bond verification entirely.
    pub federated_only: bool,
    /// Never contact other peers.
    pub lonely: bool,
    /// Loopback addresses allowed, ephemeral storage, no public-IP requirement.
    pub dev: bool,
}

impl OperatingMode {
    /// Whether the node must advertise a publicly routable address.
    pub fn requires_public_address(&self) -> bool {
        !self.dev
    }

    /// Whether candidates on loopback or private addresses are accepted.
    pub fn allows_unroutable_peers(&self) -> bool {
        self.dev
    }

    /// Whether bonding must be verified before participating.
    pub fn requires_bonding(&self) -> bool {
        !self.federated_only
    }
}
