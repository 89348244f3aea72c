//! Transaction manager - central coordinator for transactions
//!
//! Manages the lifecycle of transactions including:
//! - BEGIN: Register a transaction under a caller-supplied id
//! - COMMIT: Flush storage, mark committed, forget the id
//! - ROLLBACK: Apply undo log in reverse, mark aborted, forget the id

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    Transaction, TransactionError, TransactionId, TransactionRegistry, TransactionResult, UndoType,
};
use crate::storage::StorageEngine;

/// Transaction manager - coordinates all transaction operations
pub struct TransactionManager {
    /// Next id handed out by `allocate_id`
    next_txn_id: AtomicU64,

    /// Currently active transactions
    active_transactions: RwLock<HashMap<TransactionId, Arc<Transaction>>>,

    committed: AtomicU64,
    aborted: AtomicU64,

    /// Storage engine reference (for flush and rollback)
    storage: Arc<dyn StorageEngine>,
}

impl TransactionManager {
    /// Create a transaction manager over a storage engine
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self {
            // Start at 1 so 0 can be used as "no transaction"
            next_txn_id: AtomicU64::new(1),
            active_transactions: RwLock::new(HashMap::new()),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            storage,
        }
    }

    /// Hand out a fresh id not yet used by this manager
    pub fn allocate_id(&self) -> TransactionId {
        TransactionId(self.next_txn_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Check if a transaction is active
    pub fn is_active(&self, id: TransactionId) -> bool {
        self.active_transactions.read().contains_key(&id)
    }

    /// Get count of active transactions
    pub fn active_count(&self) -> usize {
        self.active_transactions.read().len()
    }

    /// Transactions committed since startup
    pub fn committed_count(&self) -> u64 {
        self.committed.load(Ordering::SeqCst)
    }

    /// Transactions aborted since startup
    pub fn aborted_count(&self) -> u64 {
        self.aborted.load(Ordering::SeqCst)
    }

    fn registered(&self, txn: &Transaction) -> TransactionResult<()> {
        if !self.is_active(txn.id()) {
            return Err(TransactionError::NotFound(txn.id()));
        }
        txn.ensure_active()
    }

    fn forget(&self, id: TransactionId) {
        self.active_transactions.write().remove(&id);
    }
}

#[async_trait]
impl TransactionRegistry for TransactionManager {
    fn lookup(&self, id: TransactionId) -> Option<Arc<Transaction>> {
        self.active_transactions.read().get(&id).cloned()
    }

    fn begin(&self, id: TransactionId) -> TransactionResult<Arc<Transaction>> {
        let mut active = self.active_transactions.write();
        match active.entry(id) {
            Entry::Occupied(_) => Err(TransactionError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                tracing::debug!(txn_id = %id, "begin transaction");
                Ok(slot.insert(Arc::new(Transaction::new(id))).clone())
            }
        }
    }

    fn lookup_or_begin(&self, id: TransactionId) -> TransactionResult<(Arc<Transaction>, bool)> {
        let mut active = self.active_transactions.write();
        match active.entry(id) {
            Entry::Occupied(slot) => Ok((slot.get().clone(), false)),
            Entry::Vacant(slot) => {
                tracing::debug!(txn_id = %id, "begin implicit transaction");
                Ok((slot.insert(Arc::new(Transaction::new(id))).clone(), true))
            }
        }
    }

    /// Commit a transaction
    ///
    /// Storage is flushed before the state changes, so a failed flush
    /// leaves the transaction active and still abortable.
    async fn commit(&self, txn: &Transaction) -> TransactionResult<()> {
        self.registered(txn)?;

        self.storage.flush().await?;

        txn.mark_committed()?;
        txn.undo_log().clear();
        self.forget(txn.id());
        self.committed.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(txn_id = %txn.id(), "committed");
        Ok(())
    }

    /// Rollback a transaction
    ///
    /// Applies undo records newest first. A record leaves the log only
    /// after it has been applied, so a failed abort can be retried.
    async fn abort(&self, txn: &Transaction) -> TransactionResult<()> {
        self.registered(txn)?;

        let mut undone = 0usize;
        while let Some(record) = txn.undo_log().newest() {
            match record.undo_type {
                UndoType::Insert => {
                    // Row was inserted - delete it
                    self.storage.delete(&record.row_key).await?;
                }
                UndoType::Update | UndoType::Delete => {
                    // Row was updated or deleted - restore old value
                    if let Some(old_data) = &record.old_data {
                        self.storage.put(&record.row_key, old_data).await?;
                    }
                }
            }
            txn.undo_log().discard_newest();
            undone += 1;
        }

        txn.mark_aborted()?;
        self.forget(txn.id());
        self.aborted.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(txn_id = %txn.id(), undone, "aborted");
        Ok(())
    }
}
