//! Executor error types

use std::fmt;

use crate::catalog::DataType;
use crate::plan::PlanNodeType;
use crate::storage::StorageError;
use crate::txn::TransactionError;

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Executor errors
#[derive(Debug)]
pub enum ExecutorError {
    /// Storage layer error
    Storage(StorageError),

    /// Transaction error
    Transaction(TransactionError),

    /// Value cannot be stored in a column of the given type
    TypeMismatch {
        expected: DataType,
        got: Option<DataType>,
        context: String,
    },

    /// Invalid operation (e.g., division by zero)
    InvalidOperation(String),

    /// Column index out of bounds
    ColumnIndexOutOfBounds { index: usize, row_len: usize },

    /// Plan refers to a parameter that was not bound
    ParamIndexOutOfBounds { index: usize, count: usize },

    /// Null value where not allowed
    NullValue(String),

    /// Table not found
    TableNotFound(String),

    /// A row with the same key already exists
    DuplicateKey { table: String, key: i64 },

    /// Plan node is malformed for its operator (e.g. wrong child count)
    InvalidPlan(String),

    /// Plan node tag has no operator and the config rejects such plans
    UnsupportedPlanNode { node_type: PlanNodeType, name: String },

    /// Encoding/decoding error
    Encoding(String),

    /// Internal executor error
    Internal(String),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::Storage(e) => write!(f, "storage error: {}", e),
            ExecutorError::Transaction(e) => write!(f, "transaction error: {}", e),
            ExecutorError::TypeMismatch {
                expected,
                got,
                context,
            } => {
                write!(
                    f,
                    "type mismatch: expected {:?}, got {:?} in {}",
                    expected, got, context
                )
            }
            ExecutorError::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
            ExecutorError::ColumnIndexOutOfBounds { index, row_len } => {
                write!(
                    f,
                    "column index {} out of bounds (row has {} columns)",
                    index, row_len
                )
            }
            ExecutorError::ParamIndexOutOfBounds { index, count } => {
                write!(
                    f,
                    "parameter ${} is not bound ({} parameters supplied)",
                    index + 1,
                    count
                )
            }
            ExecutorError::NullValue(context) => write!(f, "null value in {}", context),
            ExecutorError::TableNotFound(name) => write!(f, "table not found: {}", name),
            ExecutorError::DuplicateKey { table, key } => {
                write!(f, "duplicate key {} in table {}", key, table)
            }
            ExecutorError::InvalidPlan(msg) => write!(f, "invalid plan: {}", msg),
            ExecutorError::UnsupportedPlanNode { node_type, name } => {
                write!(f, "unsupported plan node {:?} ({})", node_type, name)
            }
            ExecutorError::Encoding(msg) => write!(f, "encoding error: {}", msg),
            ExecutorError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Storage(e) => Some(e),
            ExecutorError::Transaction(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for ExecutorError {
    fn from(e: StorageError) -> Self {
        ExecutorError::Storage(e)
    }
}

impl From<TransactionError> for ExecutorError {
    fn from(e: TransactionError) -> Self {
        ExecutorError::Transaction(e)
    }
}
