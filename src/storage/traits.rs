//! Storage engine trait definition

use async_trait::async_trait;

use crate::storage::error::StorageResult;

/// A key-value pair
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Ordered key-value storage used by scans and mutations
///
/// Keys are compared bytewise; `scan` must return pairs in ascending key
/// order, which is what gives table scans their storage order.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Get a value by key
    ///
    /// Returns `None` if the key does not exist or was deleted.
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Put a key-value pair, overwriting any existing value
    async fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Delete a key. No-op if the key does not exist.
    async fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Scan keys in `start <= key < end`
    ///
    /// `None` bounds are open.
    async fn scan(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StorageResult<Vec<KeyValue>>;

    /// Make all writes so far durable
    async fn flush(&self) -> StorageResult<()>;
}
