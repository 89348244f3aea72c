//! Transaction struct and related types

use std::fmt;

use parking_lot::Mutex;

use super::{TransactionError, TransactionResult, UndoLog};

/// Caller-supplied transaction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TransactionId {
    fn from(id: u64) -> Self {
        TransactionId(id)
    }
}

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and accepting operations
    Active,
    /// Transaction has been committed
    Committed,
    /// Transaction has been rolled back
    Aborted,
}

/// Terminal result of the work done under a transaction
///
/// Starts as `Success`; operators and the driver set `Failure` when
/// something goes wrong. Finalization commits on `Success` and aborts
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxnOutcome {
    #[default]
    Success,
    Failure,
}

/// A database transaction
///
/// Shared by reference between every operator of a statement, so all
/// mutable state sits behind locks.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: Mutex<TransactionState>,
    result: Mutex<TxnOutcome>,
    undo_log: UndoLog,
}

impl Transaction {
    /// Create a new active transaction
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: Mutex::new(TransactionState::Active),
            result: Mutex::new(TxnOutcome::Success),
            undo_log: UndoLog::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    /// Check if this transaction is still active
    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    pub fn result(&self) -> TxnOutcome {
        *self.result.lock()
    }

    pub fn set_result(&self, outcome: TxnOutcome) {
        *self.result.lock() = outcome;
    }

    /// Writes performed under this transaction, for rollback
    pub fn undo_log(&self) -> &UndoLog {
        &self.undo_log
    }

    /// Mark as committed
    ///
    /// Returns an error if the transaction is not active.
    pub fn mark_committed(&self) -> TransactionResult<()> {
        self.transition(TransactionState::Committed)
    }

    /// Mark as aborted
    ///
    /// Returns an error if the transaction is not active.
    pub fn mark_aborted(&self) -> TransactionResult<()> {
        self.transition(TransactionState::Aborted)
    }

    /// Fail unless the transaction is still active
    pub fn ensure_active(&self) -> TransactionResult<()> {
        let state = self.state();
        if state != TransactionState::Active {
            return Err(TransactionError::NotActive(self.id, state));
        }
        Ok(())
    }

    fn transition(&self, to: TransactionState) -> TransactionResult<()> {
        let mut state = self.state.lock();
        if *state != TransactionState::Active {
            return Err(TransactionError::NotActive(self.id, *state));
        }
        *state = to;
        Ok(())
    }
}
