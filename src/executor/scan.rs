//! Table scan executors
//!
//! Both scans read rows in key order and cut them into base tiles of at
//! most `tile_size` rows, tagged with each row's key. The predicate only
//! selects which positions are visible, so emitted tiles are views: rows
//! that failed the predicate are still present in the base tile.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::{DataType, TableDef};
use crate::plan::{Expr, IndexScanPlan, PlanNode, PlanNodeType, SeqScanPlan};

use super::context::{ExecutorContext, ExecutorEnv};
use super::datum::Datum;
use super::encoding::{decode_row, decode_row_key, key_range, table_key_end, table_key_prefix};
use super::error::{ExecutorError, ExecutorResult};
use super::eval::{eval_const, eval_predicate};
use super::tile::{BaseTile, LogicalTile};
use super::{Executor, ExecutorBase};

/// Read `[start, end)` from storage into base tiles
async fn load_tiles(
    env: &ExecutorEnv,
    table: &TableDef,
    start: &[u8],
    end: &[u8],
) -> ExecutorResult<VecDeque<Arc<BaseTile>>> {
    let kv_pairs = env.storage.scan(Some(start), Some(end)).await?;
    let schema = table.schema();

    let mut tiles = VecDeque::new();
    for chunk in kv_pairs.chunks(env.tile_size) {
        let mut rows = Vec::with_capacity(chunk.len());
        let mut keys = Vec::with_capacity(chunk.len());
        for (key, value) in chunk {
            let (_, row_key) = decode_row_key(key)?;
            keys.push(row_key);
            rows.push(decode_row(value)?);
        }
        tiles.push_back(Arc::new(BaseTile::with_locations(
            schema.clone(),
            rows,
            keys,
        )?));
    }

    tracing::trace!(table = %table.name, rows = kv_pairs.len(), tiles = tiles.len(), "scanned");
    Ok(tiles)
}

/// Next non-empty view over `pending`, filtered by `predicate`
fn next_visible(
    pending: &mut VecDeque<Arc<BaseTile>>,
    predicate: Option<&Expr>,
    params: &[Datum],
) -> ExecutorResult<Option<LogicalTile>> {
    while let Some(base) = pending.pop_front() {
        let positions = match predicate {
            Some(pred) => {
                let mut visible = Vec::new();
                for (i, row) in base.rows().iter().enumerate() {
                    if eval_predicate(pred, row, params)? {
                        visible.push(i);
                    }
                }
                visible
            }
            None => (0..base.len()).collect(),
        };
        if !positions.is_empty() {
            return Ok(Some(LogicalTile::with_positions(base, positions)));
        }
    }
    Ok(None)
}

/// Full table scan
pub struct SeqScanExecutor<'a> {
    base: ExecutorBase<'a>,
    plan: &'a SeqScanPlan,
    env: &'a ExecutorEnv,
    pending: VecDeque<Arc<BaseTile>>,
}

impl<'a> SeqScanExecutor<'a> {
    pub fn new(
        node: &'a PlanNode,
        plan: &'a SeqScanPlan,
        ctx: ExecutorContext<'a>,
        env: &'a ExecutorEnv,
    ) -> Self {
        Self {
            base: ExecutorBase::new(node, ctx),
            plan,
            env,
            pending: VecDeque::new(),
        }
    }
}

#[async_trait]
impl<'a> Executor<'a> for SeqScanExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::SeqScan
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("SeqScan", 0, 0)?;
        let table = self.env.table(&self.plan.table)?;
        let start = table_key_prefix(&table.name);
        let end = table_key_end(&table.name);
        self.pending = load_tiles(self.env, &table, &start, &end).await?;
        Ok(())
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        let params = self.base.params();
        match next_visible(&mut self.pending, self.plan.predicate.as_ref(), params)? {
            Some(tile) => {
                self.base.set_output(tile);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn close(&mut self) {
        self.pending.clear();
        self.base.clear_output();
    }
}

/// Scan over an inclusive key range
pub struct IndexScanExecutor<'a> {
    base: ExecutorBase<'a>,
    plan: &'a IndexScanPlan,
    env: &'a ExecutorEnv,
    pending: VecDeque<Arc<BaseTile>>,
}

impl<'a> IndexScanExecutor<'a> {
    pub fn new(
        node: &'a PlanNode,
        plan: &'a IndexScanPlan,
        ctx: ExecutorContext<'a>,
        env: &'a ExecutorEnv,
    ) -> Self {
        Self {
            base: ExecutorBase::new(node, ctx),
            plan,
            env,
            pending: VecDeque::new(),
        }
    }

    /// Evaluate a key bound; `Ok(None)` means unbounded
    fn bound(&self, expr: Option<&Expr>) -> ExecutorResult<Option<Datum>> {
        expr.map(|e| eval_const(e, self.base.params())).transpose()
    }
}

fn key_bound(value: &Datum, context: &str) -> ExecutorResult<i64> {
    match value {
        Datum::Int(k) => Ok(*k),
        other => Err(ExecutorError::TypeMismatch {
            expected: DataType::BigInt,
            got: other.data_type(),
            context: context.to_string(),
        }),
    }
}

#[async_trait]
impl<'a> Executor<'a> for IndexScanExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::IndexScan
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("IndexScan", 0, 0)?;
        let table = self.env.table(&self.plan.table)?;

        let low = self.bound(self.plan.low.as_ref())?;
        let high = self.bound(self.plan.high.as_ref())?;

        // A NULL bound compares false against every key
        if matches!(low, Some(Datum::Null)) || matches!(high, Some(Datum::Null)) {
            self.pending.clear();
            return Ok(());
        }
        let low = low.map(|d| key_bound(&d, "index scan low bound")).transpose()?;
        let high = high.map(|d| key_bound(&d, "index scan high bound")).transpose()?;

        self.pending = match key_range(&table.name, low, high) {
            Some((start, end)) => load_tiles(self.env, &table, &start, &end).await?,
            None => VecDeque::new(),
        };
        Ok(())
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        let params = self.base.params();
        match next_visible(&mut self.pending, self.plan.predicate.as_ref(), params)? {
            Some(tile) => {
                self.base.set_output(tile);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn close(&mut self) {
        self.pending.clear();
        self.base.clear_output();
    }
}
