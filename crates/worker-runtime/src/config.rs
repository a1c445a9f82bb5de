//! # Worker Configuration
//!
//! Unified configuration for the worker runtime.
//!
//! Values come from three layers, later layers winning:
//!
//! 1. `Default` impls below
//! 2. A TOML file (every key optional)
//! 3. `WORKER_*` environment variables
//!
//! # Config File Format
//!
//! ```toml
//! [network]
//! port = 9151
//! seeds = ["45.76.10.1:9151"]
//!
//! [identity]
//! worker_address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
//!
//! [bonding]
//! staking_provider_url = "https://staking.example.org"
//! timeout_secs = 600
//!
//! [mode]
//! dev = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use fleet_discovery::{
    BondingConfig, IpAddr, LearningConfig, OperatingMode, PeerIdentity, SocketAddr,
};
use serde::Deserialize;
use thiserror::Error;

/// Default port workers serve fleet requests on.
pub const DEFAULT_PORT: u16 = 9151;

/// Complete worker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Learning loop configuration.
    pub learning: LearningSection,
    /// Bonding gate configuration.
    pub bonding: BondingSection,
    /// Operating mode flags.
    pub mode: ModeConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Worker identity.
    pub identity: IdentityConfig,
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host to advertise, if known.
    pub host: Option<String>,
    /// Override used when `host` is unset, before asking the IP oracle.
    pub external_host: Option<String>,
    /// Port to serve and advertise.
    pub port: u16,
    /// Local address to bind instead of the unspecified address.
    pub bind: Option<String>,
    /// Seed workers contacted while no peer is known.
    pub seeds: Vec<String>,
    /// Plain-text "what is my IP" endpoint.
    pub ip_oracle_url: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: None,
            external_host: None,
            port: DEFAULT_PORT,
            bind: None,
            seeds: Vec::new(),
            ip_oracle_url: "https://ifconfig.me/ip".to_string(),
        }
    }
}

/// Learning loop configuration, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LearningSection {
    /// Delay between rounds while discovering.
    pub short_delay_secs: u64,
    /// Delay once rounds stop producing news.
    pub long_delay_secs: u64,
    /// Empty rounds before slowing down.
    pub rounds_before_slowdown: u32,
    /// Minimum gap before asking the same teacher again.
    pub teacher_cooldown_secs: u64,
    /// Upper bound on a single fleet request.
    pub request_timeout_secs: u64,
}

impl Default for LearningSection {
    fn default() -> Self {
        let defaults = LearningConfig::default();
        Self {
            short_delay_secs: defaults.short_delay.as_secs(),
            long_delay_secs: defaults.long_delay.as_secs(),
            rounds_before_slowdown: defaults.rounds_before_slowdown,
            teacher_cooldown_secs: defaults.teacher_cooldown.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

/// Bonding gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BondingSection {
    /// Base URL of the staking provider API.
    pub staking_provider_url: Option<String>,
    /// How long a pending worker waits for its bond.
    pub timeout_secs: u64,
    /// First gap between unbonded answers.
    pub initial_backoff_secs: u64,
    /// Backoff ceiling.
    pub max_backoff_secs: u64,
    /// Interval of the post-startup bond watchdog; 0 disables it.
    pub watchdog_interval_secs: u64,
}

impl Default for BondingSection {
    fn default() -> Self {
        let defaults = BondingConfig::default();
        Self {
            staking_provider_url: None,
            timeout_secs: defaults.timeout.as_secs(),
            initial_backoff_secs: defaults.initial_backoff.as_secs(),
            max_backoff_secs: defaults.max_backoff.as_secs(),
            watchdog_interval_secs: 300,
        }
    }
}

/// Operating mode flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Skip bond verification.
    pub federated_only: bool,
    /// Never contact other workers.
    pub lonely: bool,
    /// Loopback allowed, in-memory storage, ephemeral identity.
    pub dev: bool,
    /// Start, report and return without serving or learning.
    pub dry_run: bool,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the peer database and TLS material.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Worker identity configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Checksummed worker address. Required outside dev mode.
    pub worker_address: Option<String>,
}

/// Errors that can occur during config loading or validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read {path}: {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },

    /// TOML parsing error.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value could not be interpreted.
    #[error("invalid {key} '{value}': {reason}")]
    InvalidValue {
        /// Config key or environment variable.
        key: String,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Values are individually fine but inconsistent together.
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

fn invalid(key: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl WorkerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `WORKER_*` overrides read through `lookup`.
    ///
    /// `lookup` is `std::env::var` in production and a map in tests.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("WORKER_HOST") {
            self.network.host = Some(host);
        }
        if let Some(host) = lookup("WORKER_EXTERNAL_HOST") {
            self.network.external_host = Some(host);
        }
        if let Some(port) = lookup("WORKER_PORT") {
            self.network.port = port.parse().map_err(|e| invalid("WORKER_PORT", &port, e))?;
        }
        if let Some(bind) = lookup("WORKER_BIND") {
            self.network.bind = Some(bind);
        }
        if let Some(seeds) = lookup("WORKER_SEEDS") {
            self.network.seeds = seeds
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(url) = lookup("WORKER_IP_ORACLE_URL") {
            self.network.ip_oracle_url = url;
        }
        if let Some(address) = lookup("WORKER_ADDRESS") {
            self.identity.worker_address = Some(address);
        }
        if let Some(url) = lookup("WORKER_STAKING_PROVIDER_URL") {
            self.bonding.staking_provider_url = Some(url);
        }
        if let Some(secs) = lookup("WORKER_BONDING_TIMEOUT_SECS") {
            self.bonding.timeout_secs = secs
                .parse()
                .map_err(|e| invalid("WORKER_BONDING_TIMEOUT_SECS", &secs, e))?;
        }
        if let Some(dir) = lookup("WORKER_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }

        let flags: [(&str, &mut bool); 4] = [
            ("WORKER_FEDERATED_ONLY", &mut self.mode.federated_only),
            ("WORKER_LONELY", &mut self.mode.lonely),
            ("WORKER_DEV", &mut self.mode.dev),
            ("WORKER_DRY_RUN", &mut self.mode.dry_run),
        ];
        for (key, flag) in flags {
            if let Some(value) = lookup(key) {
                *flag = parse_flag(key, &value)?;
            }
        }
        Ok(())
    }

    /// Reject inconsistent combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mode = self.operating_mode();

        if self.network.port == 0 && mode.requires_public_address() {
            return Err(ConfigError::Inconsistent(
                "port 0 cannot be advertised outside dev mode".into(),
            ));
        }
        if self.identity.worker_address.is_none() && !mode.dev {
            return Err(ConfigError::Inconsistent(
                "a worker address is required outside dev mode".into(),
            ));
        }
        if mode.requires_bonding() && self.bonding.staking_provider_url.is_none() {
            return Err(ConfigError::Inconsistent(
                "bonding verification needs a staking provider URL (or federated_only)".into(),
            ));
        }
        if self.learning.short_delay_secs == 0 || self.learning.request_timeout_secs == 0 {
            return Err(ConfigError::Inconsistent(
                "learning delays and request timeout must be positive".into(),
            ));
        }
        if self.learning.long_delay_secs < self.learning.short_delay_secs {
            return Err(ConfigError::Inconsistent(
                "long learning delay is shorter than the short delay".into(),
            ));
        }

        self.worker_identity()?;
        self.host_ip()?;
        self.external_host_ip()?;
        self.bind_addr()?;
        self.seeds()?;
        Ok(())
    }

    /// Operating mode of the fleet core.
    pub fn operating_mode(&self) -> OperatingMode {
        OperatingMode {
            federated_only: self.mode.federated_only,
            lonely: self.mode.lonely,
            dev: self.mode.dev,
        }
    }

    /// Learning configuration of the fleet core.
    pub fn learning_config(&self) -> LearningConfig {
        LearningConfig {
            short_delay: Duration::from_secs(self.learning.short_delay_secs),
            long_delay: Duration::from_secs(self.learning.long_delay_secs),
            rounds_before_slowdown: self.learning.rounds_before_slowdown,
            teacher_cooldown: Duration::from_secs(self.learning.teacher_cooldown_secs),
            request_timeout: Duration::from_secs(self.learning.request_timeout_secs),
        }
    }

    /// Bonding configuration of the fleet core.
    pub fn bonding_config(&self) -> BondingConfig {
        BondingConfig {
            timeout: Duration::from_secs(self.bonding.timeout_secs),
            initial_backoff: Duration::from_secs(self.bonding.initial_backoff_secs),
            max_backoff: Duration::from_secs(self.bonding.max_backoff_secs),
        }
    }

    /// Bond watchdog interval, if enabled.
    pub fn watchdog_interval(&self) -> Option<Duration> {
        match self.bonding.watchdog_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Configured worker identity, if any.
    pub fn worker_identity(&self) -> Result<Option<PeerIdentity>, ConfigError> {
        self.identity
            .worker_address
            .as_deref()
            .map(|text| PeerIdentity::parse(text).map_err(|e| invalid("worker_address", text, e)))
            .transpose()
    }

    /// Explicit host, if any.
    pub fn host_ip(&self) -> Result<Option<IpAddr>, ConfigError> {
        parse_ip("host", self.network.host.as_deref())
    }

    /// External host override, if any.
    pub fn external_host_ip(&self) -> Result<Option<IpAddr>, ConfigError> {
        parse_ip("external_host", self.network.external_host.as_deref())
    }

    /// Local bind address, if any.
    pub fn bind_addr(&self) -> Result<Option<std::net::SocketAddr>, ConfigError> {
        self.network
            .bind
            .as_deref()
            .map(|text| text.parse().map_err(|e| invalid("bind", text, e)))
            .transpose()
    }

    /// Seed addresses.
    pub fn seeds(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.network
            .seeds
            .iter()
            .map(|text| text.parse().map_err(|e| invalid("seeds", text, e)))
            .collect()
    }
}

fn parse_ip(key: &str, value: Option<&str>) -> Result<Option<IpAddr>, ConfigError> {
    value
        .map(|text| text.parse().map_err(|e| invalid(key, text, e)))
        .transpose()
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected a boolean")),
    }
}

/// Load configuration from the file named by `WORKER_CONFIG` (if set), then
/// apply environment overrides.
pub fn load_config() -> Result<WorkerConfig, ConfigError> {
    let mut config = match std::env::var("WORKER_CONFIG") {
        Ok(path) => WorkerConfig::load(path)?,
        Err(_) => WorkerConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}
