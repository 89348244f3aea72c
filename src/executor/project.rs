//! Projection executor
//!
//! Evaluates a list of expressions over each input row and emits the
//! results as physical tiles. Without a child it evaluates once over an
//! empty row, which is how constant `SELECT`s run.

use async_trait::async_trait;

use crate::plan::{PlanNode, PlanNodeType, ProjectionPlan};

use super::context::ExecutorContext;
use super::error::ExecutorResult;
use super::eval::eval;
use super::row::Row;
use super::tile::{BaseTile, LogicalTile, Schema, SchemaColumn};
use super::{Executor, ExecutorBase};

/// Projection executor
pub struct ProjectionExecutor<'a> {
    base: ExecutorBase<'a>,
    plan: &'a ProjectionPlan,
    schema: Schema,
    /// Set once the child-less form has produced its row
    done: bool,
}

impl<'a> ProjectionExecutor<'a> {
    pub fn new(node: &'a PlanNode, plan: &'a ProjectionPlan, ctx: ExecutorContext<'a>) -> Self {
        let schema = Schema::new(
            plan.columns
                .iter()
                .map(|c| SchemaColumn::new(c.name.clone(), c.data_type))
                .collect(),
        );
        Self {
            base: ExecutorBase::new(node, ctx),
            plan,
            schema,
            done: false,
        }
    }

    fn project_row(&self, input: &Row) -> ExecutorResult<Row> {
        let params = self.base.params();
        let mut values = Vec::with_capacity(self.plan.columns.len());
        for column in &self.plan.columns {
            values.push(eval(&column.expr, input, params)?);
        }
        Ok(Row::new(values))
    }

    fn emit(&mut self, rows: Vec<Row>) {
        let tile = BaseTile::new(self.schema.clone(), rows);
        self.base.set_output(LogicalTile::from_base(tile));
    }
}

#[async_trait]
impl<'a> Executor<'a> for ProjectionExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::Projection
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("Projection", 0, 1)?;
        self.done = false;
        self.base.init_children().await
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        if self.base.child_count() == 0 {
            if self.done {
                return Ok(false);
            }
            self.done = true;
            let row = self.project_row(&Row::empty())?;
            self.emit(vec![row]);
            return Ok(true);
        }

        while let Some(tile) = self.base.next_child_tile(0).await? {
            if tile.row_count() == 0 {
                continue;
            }
            let mut rows = Vec::with_capacity(tile.row_count());
            for i in 0..tile.row_count() {
                rows.push(self.project_row(&tile.row(i)?)?);
            }
            self.emit(rows);
            return Ok(true);
        }
        Ok(false)
    }
}
