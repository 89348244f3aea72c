//! Limit executor
//!
//! Implements LIMIT and OFFSET over tiles. Output tiles are views over the
//! child's base tiles with the skipped and trailing rows hidden.

use async_trait::async_trait;

use crate::plan::{LimitPlan, PlanNode, PlanNodeType};

use super::context::ExecutorContext;
use super::error::ExecutorResult;
use super::{Executor, ExecutorBase};

/// Limit executor
pub struct LimitExecutor<'a> {
    base: ExecutorBase<'a>,
    plan: &'a LimitPlan,
    /// Number of rows skipped so far
    skipped: u64,
    /// Number of rows returned so far
    returned: u64,
}

impl<'a> LimitExecutor<'a> {
    pub fn new(node: &'a PlanNode, plan: &'a LimitPlan, ctx: ExecutorContext<'a>) -> Self {
        Self {
            base: ExecutorBase::new(node, ctx),
            plan,
            skipped: 0,
            returned: 0,
        }
    }

    fn exhausted(&self) -> bool {
        self.plan.limit.is_some_and(|limit| self.returned >= limit)
    }
}

#[async_trait]
impl<'a> Executor<'a> for LimitExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::Limit
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("Limit", 1, 1)?;
        self.skipped = 0;
        self.returned = 0;
        self.base.init_children().await
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        while !self.exhausted() {
            let Some(tile) = self.base.next_child_tile(0).await? else {
                return Ok(false);
            };

            let count = tile.row_count() as u64;
            // Skip rows for offset
            let skip = (self.plan.offset - self.skipped).min(count);
            self.skipped += skip;

            let mut take = count - skip;
            if let Some(limit) = self.plan.limit {
                take = take.min(limit - self.returned);
            }
            if take == 0 {
                continue;
            }
            self.returned += take;

            let rows: Vec<usize> = (skip..skip + take).map(|r| r as usize).collect();
            self.base.set_output(tile.select(&rows));
            return Ok(true);
        }
        Ok(false)
    }
}
