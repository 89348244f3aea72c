//! Update executor
//!
//! Rewrites the rows its child produces. Assignments are evaluated against
//! the stored row, so they see the values as they were before the update.

use async_trait::async_trait;

use crate::catalog::TableDef;
use crate::plan::{PlanNode, PlanNodeType, UpdatePlan};

use super::context::{ExecutorContext, ExecutorEnv};
use super::delete::tile_locations;
use super::encoding::{decode_row, encode_row, encode_row_key};
use super::error::{ExecutorError, ExecutorResult};
use super::eval::eval;
use super::insert::coerce_value;
use super::row::Row;
use super::{Executor, ExecutorBase};

/// Update executor
pub struct UpdateExecutor<'a> {
    base: ExecutorBase<'a>,
    plan: &'a UpdatePlan,
    env: &'a ExecutorEnv,
    table: Option<TableDef>,
    done: bool,
    rows_affected: u64,
}

impl<'a> UpdateExecutor<'a> {
    pub fn new(
        node: &'a PlanNode,
        plan: &'a UpdatePlan,
        ctx: ExecutorContext<'a>,
        env: &'a ExecutorEnv,
    ) -> Self {
        Self {
            base: ExecutorBase::new(node, ctx),
            plan,
            env,
            table: None,
            done: false,
            rows_affected: 0,
        }
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    fn apply_assignments(&self, table: &TableDef, old_row: &Row) -> ExecutorResult<Row> {
        let params = self.base.params();
        let mut new_row = old_row.clone();
        for (col_idx, expr) in &self.plan.assignments {
            let column = table
                .columns
                .get(*col_idx)
                .ok_or(ExecutorError::ColumnIndexOutOfBounds {
                    index: *col_idx,
                    row_len: table.columns.len(),
                })?;
            let value = coerce_value(table, column, &eval(expr, old_row, params)?)?;
            if *col_idx == table.key_column && &value != old_row.get(*col_idx)? {
                return Err(ExecutorError::InvalidOperation(format!(
                    "cannot change key column {}.{}",
                    table.name, column.name
                )));
            }
            new_row.set(*col_idx, value)?;
        }
        Ok(new_row)
    }
}

#[async_trait]
impl<'a> Executor<'a> for UpdateExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::Update
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("Update", 1, 1)?;
        self.table = Some(self.env.table(&self.plan.table)?);
        self.base.init_children().await
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;

        let txn = self.base.ctx()?.txn();
        txn.ensure_active()?;

        let table = self
            .table
            .clone()
            .ok_or_else(|| ExecutorError::Internal("update executed before init".to_string()))?;

        let tiles = self.base.drain_child(0).await?;
        let mut keys = tile_locations(&tiles, "Update")?;
        // Each row is updated once even if the child repeats it
        keys.sort_unstable();
        keys.dedup();

        for key in keys {
            let storage_key = encode_row_key(&table.name, key);
            let Some(old_data) = self.env.storage.get(&storage_key).await? else {
                continue;
            };
            let old_row = decode_row(&old_data)?;
            let new_row = self.apply_assignments(&table, &old_row)?;

            self.env.storage.put(&storage_key, &encode_row(&new_row)).await?;
            txn.undo_log().log_update(&table.name, storage_key, old_data);
            self.rows_affected += 1;
        }

        tracing::debug!(
            txn_id = %txn.id(),
            table = %table.name,
            rows = self.rows_affected,
            "updated"
        );
        Ok(true)
    }
}
