//! Query executor - pull-based operator trees over row tiles
//!
//! A plan tree is compiled into a tree of operators (see [`builder`]).
//! Each operator implements `init`/`execute`: `init` prepares the whole
//! subtree, each successful `execute` may leave one [`LogicalTile`] to be
//! collected with `take_output`, and `execute` returning `false` means the
//! operator is exhausted.

pub mod aggregate;
pub mod builder;
pub mod context;
pub mod convert;
pub mod datum;
pub mod delete;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod eval;
pub mod insert;
pub mod join;
pub mod limit;
pub mod materialize;
pub mod project;
pub mod row;
pub mod scan;
pub mod sort;
pub mod tile;
pub mod update;

#[cfg(test)]
pub(crate) mod mock;

pub use builder::{add_materialization, CompilationGap, CompiledTree, TreeBuilder};
pub use context::{ExecutorContext, ExecutorEnv};
pub use convert::{ColumnDesc, IdentityConverter, RowConverter, RowDescriptor, TypedRowConverter};
pub use datum::Datum;
pub use engine::{PlanExecutor, PlanResult, RunOutput};
pub use error::{ExecutorError, ExecutorResult};
pub use row::Row;
pub use tile::{BaseTile, LogicalTile, Schema, SchemaColumn, TupleIterator};

use async_trait::async_trait;

use crate::plan::{PlanNode, PlanNodeType};

/// Owned operator subtree
pub type BoxedExecutor<'a> = Box<dyn Executor<'a> + 'a>;

/// Tile-at-a-time iterator operator
///
/// Operators borrow their plan node and context for `'a`, the lifetime of
/// one statement. Children are owned and ordered; joins read child 0 as
/// the outer side.
#[async_trait]
pub trait Executor<'a>: Send {
    /// Tag of the plan node this operator runs
    fn node_type(&self) -> PlanNodeType;

    fn base(&self) -> &ExecutorBase<'a>;

    fn base_mut(&mut self) -> &mut ExecutorBase<'a>;

    /// Prepare this operator and its whole subtree
    async fn init(&mut self) -> ExecutorResult<()>;

    /// Advance by one step
    ///
    /// `Ok(true)` means progress was made; an output tile may or may not
    /// be available. `Ok(false)` means the operator is exhausted.
    async fn execute(&mut self) -> ExecutorResult<bool>;

    /// Originating plan node, `None` for synthetic operators
    fn plan_node(&self) -> Option<&'a PlanNode> {
        self.base().plan()
    }

    /// Collect the tile produced by the last `execute`, if any
    fn take_output(&mut self) -> Option<LogicalTile> {
        self.base_mut().output.take()
    }

    fn add_child(&mut self, child: BoxedExecutor<'a>) {
        self.base_mut().children.push(child);
    }

    fn children(&self) -> &[BoxedExecutor<'a>] {
        &self.base().children
    }

    /// Detach all children, leaving this operator a leaf
    fn take_children(&mut self) -> Vec<BoxedExecutor<'a>> {
        std::mem::take(&mut self.base_mut().children)
    }

    /// Release buffered state; called once during teardown
    fn close(&mut self) {
        self.base_mut().clear_output();
    }
}

/// State every operator carries
pub struct ExecutorBase<'a> {
    plan: Option<&'a PlanNode>,
    ctx: Option<ExecutorContext<'a>>,
    children: Vec<BoxedExecutor<'a>>,
    output: Option<LogicalTile>,
}

impl<'a> ExecutorBase<'a> {
    /// Base for an operator compiled from a plan node
    pub fn new(plan: &'a PlanNode, ctx: ExecutorContext<'a>) -> Self {
        Self {
            plan: Some(plan),
            ctx: Some(ctx),
            children: Vec::new(),
            output: None,
        }
    }

    /// Base for an operator with no plan node and no context
    pub fn synthetic() -> Self {
        Self {
            plan: None,
            ctx: None,
            children: Vec::new(),
            output: None,
        }
    }

    pub fn plan(&self) -> Option<&'a PlanNode> {
        self.plan
    }

    /// Execution context; synthetic operators have none
    pub fn ctx(&self) -> ExecutorResult<ExecutorContext<'a>> {
        self.ctx
            .ok_or_else(|| ExecutorError::Internal("operator has no execution context".to_string()))
    }

    /// Bound parameters, empty for synthetic operators
    pub fn params(&self) -> &'a [Datum] {
        match self.ctx {
            Some(ctx) => ctx.params(),
            None => &[],
        }
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn set_output(&mut self, tile: LogicalTile) {
        self.output = Some(tile);
    }

    pub fn clear_output(&mut self) {
        self.output = None;
    }

    /// Fail unless the operator has between `min` and `max` children
    pub fn expect_children(&self, name: &str, min: usize, max: usize) -> ExecutorResult<()> {
        let n = self.children.len();
        if n < min || n > max {
            let expected = if min == max {
                format!("{}", min)
            } else {
                format!("{} to {}", min, max)
            };
            return Err(ExecutorError::InvalidPlan(format!(
                "{} expects {} children, got {}",
                name, expected, n
            )));
        }
        Ok(())
    }

    /// Initialize every child in order
    pub async fn init_children(&mut self) -> ExecutorResult<()> {
        for child in &mut self.children {
            child.init().await?;
        }
        Ok(())
    }

    /// Pull the next tile from child `index`, skipping empty steps
    pub async fn next_child_tile(&mut self, index: usize) -> ExecutorResult<Option<LogicalTile>> {
        let child = self.children.get_mut(index).ok_or_else(|| {
            ExecutorError::Internal(format!("operator has no child {}", index))
        })?;
        loop {
            if !child.execute().await? {
                return Ok(None);
            }
            if let Some(tile) = child.take_output() {
                return Ok(Some(tile));
            }
        }
    }

    /// Pull child `index` to exhaustion
    pub async fn drain_child(&mut self, index: usize) -> ExecutorResult<Vec<LogicalTile>> {
        let mut tiles = Vec::new();
        while let Some(tile) = self.next_child_tile(index).await? {
            tiles.push(tile);
        }
        Ok(tiles)
    }

    /// Pull child `index` to exhaustion and copy out every visible row
    pub async fn drain_child_rows(&mut self, index: usize) -> ExecutorResult<(Schema, Vec<Row>)> {
        let mut schema = None;
        let mut rows = Vec::new();
        for tile in self.drain_child(index).await? {
            if schema.is_none() {
                schema = Some(tile.schema());
            }
            rows.extend(tile.rows()?);
        }
        Ok((schema.unwrap_or_default(), rows))
    }
}

/// Destroy an operator tree bottom-up
///
/// Every child is detached and destroyed before its parent is closed and
/// dropped. Taking the root by value means a tree can be destroyed only
/// once.
pub fn destroy_tree(mut root: BoxedExecutor<'_>) {
    for child in root.take_children() {
        destroy_tree(child);
    }
    tracing::trace!(node_type = ?root.node_type(), "destroying operator");
    root.close();
}
