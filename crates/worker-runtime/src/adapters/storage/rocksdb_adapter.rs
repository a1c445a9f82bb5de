//! # RocksDB Storage Adapter
//!
//! Durable implementation of the fleet `KeyValueStore` port.
//!
//! ## Column Families
//!
//! - `certificates` - pinned certificates (`cert/` keys)
//! - `peers` - learned peer records (`peer/` keys)
//!
//! Keys are stored whole, so a prefix scan is a forward seek in the family
//! owning the prefix.

use std::path::Path;

use fleet_discovery::service::{CERTIFICATE_PREFIX, PEER_PREFIX};
use fleet_discovery::{KeyValueStore, StoreError};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteOptions, DB};

/// Column family names
pub const CF_CERTIFICATES: &str = "certificates";
pub const CF_PEERS: &str = "peers";

/// All column families used by the worker
pub const COLUMN_FAMILIES: &[&str] = &[CF_CERTIFICATES, CF_PEERS];

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: String,
    /// Write buffer size in bytes (default: 8MB)
    pub write_buffer_size: usize,
    /// Enable fsync after each write (default: true for durability)
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/fleet-db".to_string(),
            write_buffer_size: 8 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed key-value store.
pub struct RocksDbStore {
    db: DB,
    config: RocksDbConfig,
    /// Serializes check-and-insert.
    insert_lock: Mutex<()>,
}

impl RocksDbStore {
    /// Open or create a database.
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| StoreError::Backend(format!("Failed to open RocksDB: {e}")))?;

        Ok(Self {
            db,
            config,
            insert_lock: Mutex::new(()),
        })
    }

    /// Open with default settings at `path`.
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open(RocksDbConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        })
    }

    fn family(&self, key: &[u8]) -> Option<&ColumnFamily> {
        if key.starts_with(CERTIFICATE_PREFIX) {
            self.db.cf_handle(CF_CERTIFICATES)
        } else if key.starts_with(PEER_PREFIX) {
            self.db.cf_handle(CF_PEERS)
        } else {
            None
        }
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }
}

fn backend(operation: &str, error: rocksdb::Error) -> StoreError {
    StoreError::Backend(format!("RocksDB {operation} failed: {error}"))
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        match self.family(key) {
            Some(cf) => self.db.get_cf(cf, key),
            None => self.db.get(key),
        }
        .map_err(|e| backend("get", e))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let opts = self.write_opts();
        match self.family(key) {
            Some(cf) => self.db.put_cf_opt(cf, key, value, &opts),
            None => self.db.put_opt(key, value, &opts),
        }
        .map_err(|e| backend("put", e))
    }

    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let _guard = self.insert_lock.lock();
        if let Some(existing) = self.get(key)? {
            return Ok(Some(existing));
        }
        self.put(key, value)?;
        Ok(None)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mode = IteratorMode::From(prefix, Direction::Forward);
        let iter = match self.family(prefix) {
            Some(cf) => self.db.iterator_cf(cf, mode),
            None => self.db.iterator(mode),
        };

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| backend("scan", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }
}
