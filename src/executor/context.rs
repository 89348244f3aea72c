//! State shared by the operators of one statement
//!
//! [`ExecutorContext`] carries the per-statement identity: the transaction
//! and the bound parameters. It is a pair of borrows, built only when the
//! tree builder actually instantiates an operator. [`ExecutorEnv`] carries
//! the long-lived engine handles (storage, catalog, tile size).

use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::{Catalog, TableDef};
use crate::storage::StorageEngine;
use crate::txn::Transaction;

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};

/// Transaction and parameters threaded through every operator
#[derive(Debug, Clone, Copy)]
pub struct ExecutorContext<'a> {
    txn: &'a Transaction,
    params: &'a [Datum],
}

impl<'a> ExecutorContext<'a> {
    pub fn new(txn: &'a Transaction, params: &'a [Datum]) -> Self {
        Self { txn, params }
    }

    pub fn txn(&self) -> &'a Transaction {
        self.txn
    }

    pub fn params(&self) -> &'a [Datum] {
        self.params
    }
}

/// Engine handles operators read tables through
#[derive(Clone)]
pub struct ExecutorEnv {
    pub storage: Arc<dyn StorageEngine>,
    pub catalog: Arc<RwLock<Catalog>>,
    /// Maximum rows per base tile produced by scans
    pub tile_size: usize,
}

impl ExecutorEnv {
    pub fn new(
        storage: Arc<dyn StorageEngine>,
        catalog: Arc<RwLock<Catalog>>,
        tile_size: usize,
    ) -> Self {
        Self {
            storage,
            catalog,
            tile_size: tile_size.max(1),
        }
    }

    /// Snapshot of a table definition
    pub fn table(&self, name: &str) -> ExecutorResult<TableDef> {
        self.catalog
            .read()
            .get_table(name)
            .cloned()
            .ok_or_else(|| ExecutorError::TableNotFound(name.to_string()))
    }
}

impl std::fmt::Debug for ExecutorEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorEnv")
            .field("tile_size", &self.tile_size)
            .finish_non_exhaustive()
    }
}
