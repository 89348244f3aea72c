//! Per-transaction undo log for rollback
//!
//! Mutating operators record the previous state of every row they touch.
//! Abort replays the records newest-first against storage.

use parking_lot::Mutex;

/// Type of undo operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoType {
    /// Row was inserted - rollback by deleting
    Insert,
    /// Row was updated - rollback by restoring old value
    Update,
    /// Row was deleted - rollback by restoring the row
    Delete,
}

/// A single undo record representing a previous row version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRecord {
    pub table_name: String,

    /// Storage key of the row
    pub row_key: Vec<u8>,

    pub undo_type: UndoType,

    /// The previous row data (None for INSERT undo - row didn't exist before)
    pub old_data: Option<Vec<u8>>,
}

/// Undo records of one transaction, in write order
#[derive(Debug, Default)]
pub struct UndoLog {
    records: Mutex<Vec<UndoRecord>>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log an INSERT; rollback deletes the row
    pub fn log_insert(&self, table_name: &str, row_key: Vec<u8>) {
        self.push(UndoRecord {
            table_name: table_name.to_string(),
            row_key,
            undo_type: UndoType::Insert,
            old_data: None,
        });
    }

    /// Log an UPDATE; rollback restores `old_data`
    pub fn log_update(&self, table_name: &str, row_key: Vec<u8>, old_data: Vec<u8>) {
        self.push(UndoRecord {
            table_name: table_name.to_string(),
            row_key,
            undo_type: UndoType::Update,
            old_data: Some(old_data),
        });
    }

    /// Log a DELETE; rollback restores `old_data`
    pub fn log_delete(&self, table_name: &str, row_key: Vec<u8>, old_data: Vec<u8>) {
        self.push(UndoRecord {
            table_name: table_name.to_string(),
            row_key,
            undo_type: UndoType::Delete,
            old_data: Some(old_data),
        });
    }

    fn push(&self, record: UndoRecord) {
        self.records.lock().push(record);
    }

    /// Newest record, left in the log
    pub fn newest(&self) -> Option<UndoRecord> {
        self.records.lock().last().cloned()
    }

    /// Drop the newest record once it has been applied
    pub fn discard_newest(&self) {
        self.records.lock().pop();
    }

    /// Discard all records
    pub fn clear(&self) {
        self.records.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
