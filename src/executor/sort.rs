//! Sort executor
//!
//! Implements ORDER BY by collecting all rows, sorting them, then emitting
//! them as a single physical tile. The sort is stable, so rows with equal
//! keys keep their input order.

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::plan::{OrderByPlan, PlanNode, PlanNodeType, SortKey};

use super::context::ExecutorContext;
use super::datum::Datum;
use super::error::ExecutorResult;
use super::row::Row;
use super::tile::{BaseTile, LogicalTile};
use super::{Executor, ExecutorBase};

/// Sort executor
pub struct OrderByExecutor<'a> {
    base: ExecutorBase<'a>,
    plan: &'a OrderByPlan,
    done: bool,
}

impl<'a> OrderByExecutor<'a> {
    pub fn new(node: &'a PlanNode, plan: &'a OrderByPlan, ctx: ExecutorContext<'a>) -> Self {
        Self {
            base: ExecutorBase::new(node, ctx),
            plan,
            done: false,
        }
    }
}

fn compare_keys(keys: &[SortKey], a: &[Datum], b: &[Datum]) -> Ordering {
    for (key, (key_a, key_b)) in keys.iter().zip(a.iter().zip(b)) {
        let cmp = key_a.cmp(key_b);
        let cmp = if key.ascending { cmp } else { cmp.reverse() };
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl<'a> Executor<'a> for OrderByExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::OrderBy
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("OrderBy", 1, 1)?;
        self.done = false;
        self.base.init_children().await
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;

        let (schema, rows) = self.base.drain_child_rows(0).await?;
        if rows.is_empty() {
            return Ok(false);
        }

        // Precompute sort keys; comparisons cannot fail
        let columns: Vec<usize> = self.plan.keys.iter().map(|k| k.column).collect();
        let mut keyed: Vec<(Vec<Datum>, Row)> = Vec::with_capacity(rows.len());
        for row in rows {
            keyed.push((row.project(&columns)?.into_values(), row));
        }

        let keys = &self.plan.keys;
        keyed.sort_by(|(a, _), (b, _)| compare_keys(keys, a, b));

        let sorted = keyed.into_iter().map(|(_, row)| row).collect();
        self.base
            .set_output(LogicalTile::from_base(BaseTile::new(schema, sorted)));
        Ok(true)
    }
}
