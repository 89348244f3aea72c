//! Delete executor
//!
//! Deletes the rows its child produces, located through the row keys the
//! child's scan attached to its base tiles.

use async_trait::async_trait;

use crate::plan::{DeletePlan, PlanNode, PlanNodeType};

use super::context::{ExecutorContext, ExecutorEnv};
use super::encoding::encode_row_key;
use super::error::{ExecutorError, ExecutorResult};
use super::tile::LogicalTile;
use super::{Executor, ExecutorBase};

/// Row keys behind every visible row of `tiles`
pub(crate) fn tile_locations(tiles: &[LogicalTile], op: &str) -> ExecutorResult<Vec<i64>> {
    let mut keys = Vec::new();
    for tile in tiles {
        for row in 0..tile.row_count() {
            let key = tile.location(row, 0)?.ok_or_else(|| {
                ExecutorError::InvalidPlan(format!("{} input does not come from a table scan", op))
            })?;
            keys.push(key);
        }
    }
    Ok(keys)
}

/// Delete executor
pub struct DeleteExecutor<'a> {
    base: ExecutorBase<'a>,
    plan: &'a DeletePlan,
    env: &'a ExecutorEnv,
    done: bool,
    rows_affected: u64,
}

impl<'a> DeleteExecutor<'a> {
    pub fn new(
        node: &'a PlanNode,
        plan: &'a DeletePlan,
        ctx: ExecutorContext<'a>,
        env: &'a ExecutorEnv,
    ) -> Self {
        Self {
            base: ExecutorBase::new(node, ctx),
            plan,
            env,
            done: false,
            rows_affected: 0,
        }
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

#[async_trait]
impl<'a> Executor<'a> for DeleteExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::Delete
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("Delete", 1, 1)?;
        self.env.table(&self.plan.table)?;
        self.base.init_children().await
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;

        let txn = self.base.ctx()?.txn();
        txn.ensure_active()?;

        // Read everything first so the child never sees our writes
        let tiles = self.base.drain_child(0).await?;
        let keys = tile_locations(&tiles, "Delete")?;

        for key in keys {
            let storage_key = encode_row_key(&self.plan.table, key);
            // A row can reach us twice through a join; delete it once
            if let Some(old) = self.env.storage.get(&storage_key).await? {
                self.env.storage.delete(&storage_key).await?;
                txn.undo_log().log_delete(&self.plan.table, storage_key, old);
                self.rows_affected += 1;
            }
        }

        tracing::debug!(
            txn_id = %txn.id(),
            table = %self.plan.table,
            rows = self.rows_affected,
            "deleted"
        );
        Ok(true)
    }
}
