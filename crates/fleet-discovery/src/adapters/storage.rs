//! In-memory key/value store.
//!
//! Used in dev mode and tests. Nothing survives the process.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::domain::StoreError;
use crate::ports::KeyValueStore;

/// In-memory implementation of KeyValueStore.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKeyValueStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let mut data = self.data.write();
        if let Some(existing) = data.get(key) {
            return Ok(Some(existing.clone()));
        }
        data.insert(key.to_vec(), value.to_vec());
        Ok(None)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_if_absent_keeps_first_value() {
        let store = InMemoryKeyValueStore::new();
        assert_eq!(store.put_if_absent(b"k", b"one").unwrap(), None);
        assert_eq!(
            store.put_if_absent(b"k", b"two").unwrap(),
            Some(b"one".to_vec())
        );
        assert_eq!(store.get(b"k").unwrap(), Some(b"one".to_vec()));
    }

    #[test]
    fn test_prefix_scan_is_ordered_and_bounded() {
        let store = InMemoryKeyValueStore::new();
        store.put(b"peer/b", b"2").unwrap();
        store.put(b"peer/a", b"1").unwrap();
        store.put(b"cert/a", b"x").unwrap();
        store.put(b"peers", b"y").unwrap();

        let scanned = store.prefix_scan(b"peer/").unwrap();
        assert_eq!(
            scanned,
            vec![
                (b"peer/a".to_vec(), b"1".to_vec()),
                (b"peer/b".to_vec(), b"2".to_vec()),
            ]
        );
        assert_eq!(store.len(), 4);
    }
}
