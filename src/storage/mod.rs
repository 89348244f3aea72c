//! Storage subsystem
//!
//! The executor only needs ordered key-value access. `MemoryStorage` is the
//! in-process engine used by the binary and the test suites; anything that
//! implements [`StorageEngine`] can stand in for it.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use traits::{KeyValue, StorageEngine};
