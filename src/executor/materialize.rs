//! Materialization executor
//!
//! Flattens view tiles into physical tiles so that base tile 0 holds
//! exactly the visible rows. Used for explicit Materialize plan nodes and
//! as the synthetic root placed over view-producing roots.

use async_trait::async_trait;

use crate::plan::{PlanNode, PlanNodeType};

use super::context::ExecutorContext;
use super::error::ExecutorResult;
use super::{Executor, ExecutorBase};

/// Materialization executor
pub struct MaterializationExecutor<'a> {
    base: ExecutorBase<'a>,
}

impl<'a> MaterializationExecutor<'a> {
    pub fn new(node: &'a PlanNode, ctx: ExecutorContext<'a>) -> Self {
        Self {
            base: ExecutorBase::new(node, ctx),
        }
    }

    /// Operator with no plan node and no context
    pub fn synthetic() -> Self {
        Self {
            base: ExecutorBase::synthetic(),
        }
    }
}

#[async_trait]
impl<'a> Executor<'a> for MaterializationExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::Materialize
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("Materialize", 1, 1)?;
        self.base.init_children().await
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        let Some(tile) = self.base.next_child_tile(0).await? else {
            return Ok(false);
        };
        let tile = if tile.is_physical() {
            tile
        } else {
            tile.materialize()?
        };
        self.base.set_output(tile);
        Ok(true)
    }
}
