//! Storage adapters.
//!
//! - RocksDB (feature `rocksdb`): durable pins and peer records
//!
//! Without the feature, workers fall back to the in-memory store of
//! `fleet-discovery` and forget everything on exit.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};
