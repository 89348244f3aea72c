//! Transaction management module
//!
//! Provides the transaction lifecycle used by the plan executor:
//! - Caller-scoped or implicit transactions keyed by a caller-supplied id
//! - A terminal result flag any operator may downgrade to failure
//! - Undo logging so that abort rolls back the writes of a statement

mod manager;
mod transaction;
mod undo_log;

pub use manager::TransactionManager;
pub use transaction::{Transaction, TransactionId, TransactionState, TxnOutcome};
pub use undo_log::{UndoLog, UndoRecord, UndoType};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Transaction operation errors
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Transaction not found
    #[error("Transaction {0} not found")]
    NotFound(TransactionId),

    /// A transaction with this id is already registered
    #[error("Transaction {0} already exists")]
    AlreadyExists(TransactionId),

    /// Transaction already committed or aborted
    #[error("Transaction {0} is not active (state: {1:?})")]
    NotActive(TransactionId, TransactionState),

    /// Storage error during transaction operation
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for transaction operations
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Process-wide transaction registry
///
/// Each call is atomic with respect to a single transaction id, so the
/// registry may be shared between statements running on different threads.
#[async_trait]
pub trait TransactionRegistry: Send + Sync {
    /// Find an active transaction
    fn lookup(&self, id: TransactionId) -> Option<Arc<Transaction>>;

    /// Start a transaction under `id`
    fn begin(&self, id: TransactionId) -> TransactionResult<Arc<Transaction>>;

    /// Find the transaction for `id`, starting it if absent
    ///
    /// The flag is `true` when the transaction was created by this call.
    fn lookup_or_begin(&self, id: TransactionId) -> TransactionResult<(Arc<Transaction>, bool)>;

    /// Make the transaction's writes durable and end it
    async fn commit(&self, txn: &Transaction) -> TransactionResult<()>;

    /// Roll back the transaction's writes and end it
    async fn abort(&self, txn: &Transaction) -> TransactionResult<()>;
}
