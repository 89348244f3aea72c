//! In-memory ordered storage engine

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::{StorageError, StorageResult};
use super::traits::{KeyValue, StorageEngine};

/// Largest accepted key
pub const MAX_KEY_SIZE: usize = 4096;
/// Largest accepted value
pub const MAX_VALUE_SIZE: usize = 1 << 20;

/// Ordered key-value store kept in a `BTreeMap`
///
/// Not persistent; `flush` only counts calls so tests can observe commits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    flushes: AtomicU64,
    closed: AtomicBool,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with key-value pairs
    pub fn with_data(initial: impl IntoIterator<Item = KeyValue>) -> Self {
        let storage = Self::new();
        storage.data.write().extend(initial);
        storage
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Number of `flush` calls so far
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Reject all further operations
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageEngine for MemoryStorage {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.check_open()?;
        Ok(self.data.read().get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.check_open()?;
        if key.len() > MAX_KEY_SIZE {
            return Err(StorageError::KeyTooLarge {
                size: key.len(),
                max: MAX_KEY_SIZE,
            });
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(StorageError::ValueTooLarge {
                size: value.len(),
                max: MAX_VALUE_SIZE,
            });
        }
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.check_open()?;
        self.data.write().remove(key);
        Ok(())
    }

    async fn scan(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<Vec<KeyValue>> {
        self.check_open()?;
        let lower = start.map_or(Bound::Unbounded, Bound::Included);
        let upper = end.map_or(Bound::Unbounded, Bound::Excluded);
        if let (Some(s), Some(e)) = (start, end) {
            if s >= e {
                return Ok(Vec::new());
            }
        }
        let data = self.data.read();
        Ok(data
            .range::<[u8], _>((lower, upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn flush(&self) -> StorageResult<()> {
        self.check_open()?;
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
