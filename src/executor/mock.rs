//! Scripted operator for unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::catalog::DataType;
use crate::plan::PlanNodeType;

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::row::Row;
use super::tile::{BaseTile, LogicalTile, Schema, SchemaColumn};
use super::{Executor, ExecutorBase};

/// Emits a fixed list of tiles
pub(crate) struct MockExecutor<'a> {
    base: ExecutorBase<'a>,
    name: &'static str,
    node_type: PlanNodeType,
    tiles: VecDeque<LogicalTile>,
    empty_steps: usize,
    fail_init: bool,
    close_log: Option<Arc<Mutex<Vec<&'static str>>>>,
}

impl<'a> MockExecutor<'a> {
    pub fn new(tiles: Vec<LogicalTile>) -> Self {
        Self::named("mock", tiles)
    }

    pub fn named(name: &'static str, tiles: Vec<LogicalTile>) -> Self {
        Self {
            base: ExecutorBase::synthetic(),
            name,
            node_type: PlanNodeType::SeqScan,
            tiles: tiles.into(),
            empty_steps: 0,
            fail_init: false,
            close_log: None,
        }
    }

    /// Report successful steps with no output before the first tile
    pub fn with_empty_steps(mut self, n: usize) -> Self {
        self.empty_steps = n;
        self
    }

    pub fn with_node_type(mut self, node_type: PlanNodeType) -> Self {
        self.node_type = node_type;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn with_close_log(mut self, log: Arc<Mutex<Vec<&'static str>>>) -> Self {
        self.close_log = Some(log);
        self
    }
}

#[async_trait]
impl<'a> Executor<'a> for MockExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        self.node_type
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        if self.fail_init {
            return Err(ExecutorError::Internal("mock init failure".to_string()));
        }
        self.base.init_children().await
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        if self.empty_steps > 0 {
            self.empty_steps -= 1;
            return Ok(true);
        }
        match self.tiles.pop_front() {
            Some(tile) => {
                self.base.set_output(tile);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn close(&mut self) {
        if let Some(log) = &self.close_log {
            log.lock().unwrap().push(self.name);
        }
    }
}

/// Single-column `v BIGINT` physical tile
pub(crate) fn int_tile(values: &[i64]) -> LogicalTile {
    rows_tile(
        &[("v", DataType::BigInt)],
        values.iter().map(|v| vec![Datum::Int(*v)]).collect(),
    )
}

/// Physical tile with the given columns and rows
pub(crate) fn rows_tile(columns: &[(&str, DataType)], rows: Vec<Vec<Datum>>) -> LogicalTile {
    let schema = Schema::new(
        columns
            .iter()
            .map(|(name, ty)| SchemaColumn::new(*name, *ty))
            .collect(),
    );
    LogicalTile::from_base(BaseTile::new(
        schema,
        rows.into_iter().map(Row::new).collect(),
    ))
}

/// Visible rows of every tile, in order
pub(crate) fn collect_rows(tiles: &[LogicalTile]) -> Vec<Row> {
    tiles.iter().flat_map(|t| t.rows().unwrap()).collect()
}

/// Rows of a single-column integer result
pub(crate) fn ints(rows: &[Row]) -> Vec<i64> {
    rows.iter().map(|r| r.get(0).unwrap().as_int().unwrap()).collect()
}

/// Initialize `op` and pull it to exhaustion
pub(crate) async fn drain<'a, E>(op: &mut E) -> ExecutorResult<Vec<LogicalTile>>
where
    E: Executor<'a> + ?Sized,
{
    op.init().await?;
    let mut tiles = Vec::new();
    while op.execute().await? {
        if let Some(tile) = op.take_output() {
            tiles.push(tile);
        }
    }
    Ok(tiles)
}

/// In-memory engine with a `users (id BIGINT key, name TEXT, age INT NULL)` table
pub(crate) struct TestDb {
    pub storage: Arc<crate::storage::MemoryStorage>,
    pub env: super::ExecutorEnv,
    pub txn: crate::txn::Transaction,
}

impl TestDb {
    pub fn new(tile_size: usize) -> Self {
        use crate::catalog::{Catalog, ColumnDef, TableDef};

        let storage = Arc::new(crate::storage::MemoryStorage::new());
        let mut catalog = Catalog::new();
        catalog
            .create_table(
                TableDef::new("users")
                    .column(ColumnDef::new("id", DataType::BigInt).nullable(false))
                    .column(ColumnDef::new("name", DataType::Text).nullable(false))
                    .column(ColumnDef::new("age", DataType::Int)),
            )
            .unwrap();
        let env = super::ExecutorEnv::new(
            storage.clone(),
            Arc::new(parking_lot::RwLock::new(catalog)),
            tile_size,
        );
        Self {
            storage,
            env,
            txn: crate::txn::Transaction::new(crate::txn::TransactionId(1)),
        }
    }

    pub fn ctx<'a>(&'a self, params: &'a [Datum]) -> super::ExecutorContext<'a> {
        super::ExecutorContext::new(&self.txn, params)
    }

    pub async fn insert(&self, id: i64, name: &str, age: Option<i64>) {
        use crate::storage::StorageEngine;

        let row = Row::new(vec![
            Datum::Int(id),
            Datum::from(name),
            age.map_or(Datum::Null, Datum::Int),
        ]);
        self.storage
            .put(
                &super::encoding::encode_row_key("users", id),
                &super::encoding::encode_row(&row),
            )
            .await
            .unwrap();
    }

    /// Current contents of `users` in key order
    pub async fn users(&self) -> Vec<Row> {
        use crate::storage::StorageEngine;

        let start = super::encoding::table_key_prefix("users");
        let end = super::encoding::table_key_end("users");
        self.storage
            .scan(Some(&start), Some(&end))
            .await
            .unwrap()
            .iter()
            .map(|(_, v)| super::encoding::decode_row(v).unwrap())
            .collect()
    }
}
