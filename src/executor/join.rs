//! Join executors
//!
//! Inner joins over two children: child 0 is the outer (left) input and
//! child 1 the inner (right) input. Output tiles are views that place the
//! base tiles of both sides next to each other.

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::plan::{MergeJoinPlan, NestedLoopJoinPlan, PlanNode, PlanNodeType};

use super::context::ExecutorContext;
use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::eval::eval_predicate;
use super::row::Row;
use super::tile::{BaseTile, LogicalTile};
use super::{Executor, ExecutorBase};

/// Drain a child into a single physical tile
async fn buffer_side(base: &mut ExecutorBase<'_>, index: usize) -> ExecutorResult<LogicalTile> {
    let (schema, rows) = base.drain_child_rows(index).await?;
    Ok(LogicalTile::from_base(BaseTile::new(schema, rows)))
}

/// Nested loop join executor
pub struct NestedLoopJoinExecutor<'a> {
    base: ExecutorBase<'a>,
    plan: &'a NestedLoopJoinPlan,
    /// Materialized inner side
    inner: Option<LogicalTile>,
    inner_rows: Vec<Row>,
}

impl<'a> NestedLoopJoinExecutor<'a> {
    pub fn new(node: &'a PlanNode, plan: &'a NestedLoopJoinPlan, ctx: ExecutorContext<'a>) -> Self {
        Self {
            base: ExecutorBase::new(node, ctx),
            plan,
            inner: None,
            inner_rows: Vec::new(),
        }
    }

    /// Matching (outer row, inner row) pairs for one outer tile
    fn join_pairs(&self, outer: &LogicalTile) -> ExecutorResult<Vec<(usize, usize)>> {
        let params = self.base.params();
        let mut pairs = Vec::new();
        for l in 0..outer.row_count() {
            let left_row = outer.row(l)?;
            for (r, right_row) in self.inner_rows.iter().enumerate() {
                let matched = match &self.plan.predicate {
                    Some(pred) => {
                        eval_predicate(pred, &Row::concat_ref(&left_row, right_row), params)?
                    }
                    None => true,
                };
                if matched {
                    pairs.push((l, r));
                }
            }
        }
        Ok(pairs)
    }
}

#[async_trait]
impl<'a> Executor<'a> for NestedLoopJoinExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::NestedLoopJoin
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("NestedLoopJoin", 2, 2)?;
        self.inner = None;
        self.inner_rows.clear();
        self.base.init_children().await
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        if self.inner.is_none() {
            let inner = buffer_side(&mut self.base, 1).await?;
            self.inner_rows = inner.rows()?;
            self.inner = Some(inner);
        }
        if self.inner_rows.is_empty() {
            return Ok(false);
        }

        while let Some(outer) = self.base.next_child_tile(0).await? {
            let pairs = self.join_pairs(&outer)?;
            if pairs.is_empty() {
                continue;
            }
            let Some(inner) = self.inner.as_ref() else {
                return Ok(false);
            };
            let joined = LogicalTile::join(&outer, inner, &pairs);
            self.base.set_output(joined);
            return Ok(true);
        }
        Ok(false)
    }

    fn close(&mut self) {
        self.inner = None;
        self.inner_rows.clear();
        self.base.clear_output();
    }
}

/// Merge join executor
///
/// Both inputs must arrive sorted ascending on their join keys. Rows with
/// a NULL key never match.
pub struct MergeJoinExecutor<'a> {
    base: ExecutorBase<'a>,
    plan: &'a MergeJoinPlan,
    done: bool,
}

impl<'a> MergeJoinExecutor<'a> {
    pub fn new(node: &'a PlanNode, plan: &'a MergeJoinPlan, ctx: ExecutorContext<'a>) -> Self {
        Self {
            base: ExecutorBase::new(node, ctx),
            plan,
            done: false,
        }
    }
}

/// Join keys of a side, checking the sort order
fn side_keys(tile: &LogicalTile, column: usize, side: &str) -> ExecutorResult<Vec<Datum>> {
    let mut keys: Vec<Datum> = Vec::with_capacity(tile.row_count());
    for row in 0..tile.row_count() {
        let key = tile.value(row, column)?.clone();
        if let Some(prev) = keys.last() {
            if *prev > key {
                return Err(ExecutorError::InvalidOperation(format!(
                    "merge join {} input is not sorted on column {}",
                    side, column
                )));
            }
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Index pairs of equal keys, left-major
fn merge_pairs(left: &[Datum], right: &[Datum]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if left[i].is_null() {
            i += 1;
            continue;
        }
        if right[j].is_null() {
            j += 1;
            continue;
        }
        match left[i].cmp(&right[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                let i_end = i + left[i..].iter().take_while(|k| **k == left[i]).count();
                let j_end = j + right[j..].iter().take_while(|k| **k == right[j]).count();
                for l in i..i_end {
                    for r in j..j_end {
                        pairs.push((l, r));
                    }
                }
                i = i_end;
                j = j_end;
            }
        }
    }
    pairs
}

#[async_trait]
impl<'a> Executor<'a> for MergeJoinExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::MergeJoin
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("MergeJoin", 2, 2)?;
        self.done = false;
        self.base.init_children().await
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;

        let left = buffer_side(&mut self.base, 0).await?;
        let right = buffer_side(&mut self.base, 1).await?;
        if left.row_count() == 0 || right.row_count() == 0 {
            return Ok(false);
        }

        let left_keys = side_keys(&left, self.plan.left_key, "left")?;
        let right_keys = side_keys(&right, self.plan.right_key, "right")?;
        let pairs = merge_pairs(&left_keys, &right_keys);
        if pairs.is_empty() {
            return Ok(false);
        }

        self.base.set_output(LogicalTile::join(&left, &right, &pairs));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::executor::mock::{collect_rows, drain, int_tile, rows_tile, MockExecutor, TestDb};
    use crate::plan::{Expr, PlanKind};

    fn pairs_of(rows: &[Row]) -> Vec<(i64, i64)> {
        rows.iter()
            .map(|r| {
                (
                    r.get(0).unwrap().as_int().unwrap(),
                    r.get(r.len() - 1).unwrap().as_int().unwrap(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_nested_loop_join_with_predicate() {
        let db = TestDb::new(4);
        let node = PlanNode::nested_loop_join(Some(Expr::lt(Expr::col(0), Expr::col(1))));
        let plan = match node.kind() {
            PlanKind::NestedLoopJoin(p) => p,
            _ => unreachable!(),
        };
        let mut join = NestedLoopJoinExecutor::new(&node, plan, db.ctx(&[]));
        join.add_child(Box::new(MockExecutor::new(vec![
            int_tile(&[1, 2]),
            int_tile(&[5]),
            int_tile(&[3]),
        ])));
        join.add_child(Box::new(MockExecutor::new(vec![
            int_tile(&[2]),
            int_tile(&[4]),
        ])));

        let tiles = drain(&mut join).await.unwrap();
        // The tile holding 5 has no match and produces nothing
        assert_eq!(tiles.len(), 2);
        assert_eq!(
            pairs_of(&collect_rows(&tiles)),
            vec![(1, 2), (1, 4), (2, 4), (3, 4)]
        );
        assert_eq!(tiles[0].base_tile_count(), 2);
    }

    #[tokio::test]
    async fn test_nested_loop_cross_join_and_empty_inner() {
        let db = TestDb::new(4);
        let node = PlanNode::nested_loop_join(None);
        let plan = match node.kind() {
            PlanKind::NestedLoopJoin(p) => p,
            _ => unreachable!(),
        };

        let mut join = NestedLoopJoinExecutor::new(&node, plan, db.ctx(&[]));
        join.add_child(Box::new(MockExecutor::new(vec![int_tile(&[1, 2])])));
        join.add_child(Box::new(MockExecutor::new(vec![int_tile(&[7, 8])])));
        assert_eq!(collect_rows(&drain(&mut join).await.unwrap()).len(), 4);

        let mut join = NestedLoopJoinExecutor::new(&node, plan, db.ctx(&[]));
        join.add_child(Box::new(MockExecutor::new(vec![int_tile(&[1, 2])])));
        join.add_child(Box::new(MockExecutor::new(vec![])));
        assert!(drain(&mut join).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nested_loop_join_needs_two_children() {
        let db = TestDb::new(4);
        let node = PlanNode::nested_loop_join(None);
        let plan = match node.kind() {
            PlanKind::NestedLoopJoin(p) => p,
            _ => unreachable!(),
        };
        let mut join = NestedLoopJoinExecutor::new(&node, plan, db.ctx(&[]));
        join.add_child(Box::new(MockExecutor::new(vec![])));
        assert!(matches!(
            join.init().await,
            Err(ExecutorError::InvalidPlan(_))
        ));
    }

    #[tokio::test]
    async fn test_merge_join_duplicates_and_nulls() {
        let db = TestDb::new(4);
        let node = PlanNode::merge_join(0, 1);
        let plan = match node.kind() {
            PlanKind::MergeJoin(p) => p,
            _ => unreachable!(),
        };
        let mut join = MergeJoinExecutor::new(&node, plan, db.ctx(&[]));
        join.add_child(Box::new(MockExecutor::new(vec![
            rows_tile(
                &[("k", DataType::BigInt)],
                vec![vec![Datum::Null], vec![Datum::Int(1)], vec![Datum::Int(2)]],
            ),
            int_tile(&[2, 4]),
        ])));
        join.add_child(Box::new(MockExecutor::new(vec![rows_tile(
            &[("tag", DataType::Text), ("k", DataType::BigInt)],
            vec![
                vec![Datum::from("n"), Datum::Null],
                vec![Datum::from("a"), Datum::Int(2)],
                vec![Datum::from("b"), Datum::Int(2)],
                vec![Datum::from("c"), Datum::Int(3)],
                vec![Datum::from("d"), Datum::Int(4)],
            ],
        )])));

        let tiles = drain(&mut join).await.unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(
            pairs_of(&collect_rows(&tiles)),
            vec![(2, 2), (2, 2), (2, 2), (2, 2), (4, 4)]
        );
        let tags: Vec<_> = collect_rows(&tiles)
            .iter()
            .map(|r| r.get(1).unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(tags, vec!["a", "b", "a", "b", "d"]);
    }

    #[tokio::test]
    async fn test_merge_join_rejects_unsorted_input() {
        let db = TestDb::new(4);
        let node = PlanNode::merge_join(0, 0);
        let plan = match node.kind() {
            PlanKind::MergeJoin(p) => p,
            _ => unreachable!(),
        };
        let mut join = MergeJoinExecutor::new(&node, plan, db.ctx(&[]));
        join.add_child(Box::new(MockExecutor::new(vec![int_tile(&[3, 1])])));
        join.add_child(Box::new(MockExecutor::new(vec![int_tile(&[1])])));
        assert!(matches!(
            drain(&mut join).await,
            Err(ExecutorError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_merge_pairs() {
        let left: Vec<Datum> = [1, 3, 3, 5].iter().map(|v| Datum::Int(*v)).collect();
        let right: Vec<Datum> = [3, 5, 5, 6].iter().map(|v| Datum::Int(*v)).collect();
        assert_eq!(
            merge_pairs(&left, &right),
            vec![(1, 0), (2, 0), (3, 1), (3, 2)]
        );
    }
}
