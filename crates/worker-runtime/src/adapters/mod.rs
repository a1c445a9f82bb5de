//! # Production Adapters
//!
//! - `http`: staking provider and external IP oracles (reqwest)
//! - `tls_store`: on-disk certificate and key
//! - `storage`: RocksDB key/value store (feature `rocksdb`)

pub mod http;
pub mod storage;
pub mod tls_store;

pub use http::{HttpAddressOracle, HttpStakingOracle};
pub use tls_store::TlsMaterialStore;

#[cfg(feature = "rocksdb")]
pub use storage::{RocksDbConfig, RocksDbStore};
