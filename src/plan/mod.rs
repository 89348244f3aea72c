//! Physical plan trees handed to the executor
//!
//! A plan is produced by the planner (outside this crate) and consumed
//! read-only: the executor only ever borrows [`PlanNode`]s. Each node
//! carries a [`PlanKind`] (tag plus operator payload) and an ordered list
//! of children. Child order matters: joins read child 0 as the outer side
//! and child 1 as the inner side.

pub mod explain;
pub mod expr;

pub use explain::explain;
pub use expr::{BinaryOp, Expr};

use crate::catalog::DataType;

/// Plan node tag
///
/// `Unsupported` stands for any node kind the planner can emit but the
/// executor has no operator for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanNodeType {
    Invalid,
    SeqScan,
    IndexScan,
    Insert,
    Delete,
    Update,
    Limit,
    NestedLoopJoin,
    MergeJoin,
    Projection,
    Materialize,
    Aggregate,
    OrderBy,
    Unsupported,
}

/// Sequential scan over a whole table
#[derive(Debug, Clone, PartialEq)]
pub struct SeqScanPlan {
    pub table: String,
    /// Rows failing the predicate stay in the base tile but are not visible
    pub predicate: Option<Expr>,
}

/// Key-range scan; bounds are inclusive and may reference parameters
#[derive(Debug, Clone, PartialEq)]
pub struct IndexScanPlan {
    pub table: String,
    pub low: Option<Expr>,
    pub high: Option<Expr>,
    pub predicate: Option<Expr>,
}

/// Insert literal rows, or the rows produced by child 0 when present
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    pub table: String,
    pub values: Vec<Vec<Expr>>,
}

/// Delete the rows produced by child 0
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    pub table: String,
}

/// Rewrite the rows produced by child 0
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub table: String,
    /// (column index, new value evaluated against the old row)
    pub assignments: Vec<(usize, Expr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitPlan {
    pub limit: Option<u64>,
    pub offset: u64,
}

/// Inner nested loop join; the predicate sees `outer ++ inner` columns
#[derive(Debug, Clone, PartialEq)]
pub struct NestedLoopJoinPlan {
    pub predicate: Option<Expr>,
}

/// Inner equi-join of two inputs sorted ascending on their keys
#[derive(Debug, Clone, PartialEq)]
pub struct MergeJoinPlan {
    pub left_key: usize,
    pub right_key: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectColumn {
    pub expr: Expr,
    pub name: String,
    pub data_type: DataType,
}

impl ProjectColumn {
    pub fn new(expr: Expr, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            expr,
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionPlan {
    pub columns: Vec<ProjectColumn>,
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    /// COUNT(*): counts rows, ignores the argument
    CountStar,
    /// COUNT(expr): counts non-null values
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub func: AggregateFunc,
    pub arg: Option<Expr>,
    pub name: String,
}

impl AggregateExpr {
    pub fn new(func: AggregateFunc, arg: Option<Expr>, name: impl Into<String>) -> Self {
        Self {
            func,
            arg,
            name: name.into(),
        }
    }
}

/// Hash aggregation; output is group columns followed by aggregates
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatePlan {
    pub group_by: Vec<usize>,
    pub aggregates: Vec<AggregateExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: usize,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByPlan {
    pub keys: Vec<SortKey>,
}

/// Plan node tag together with its operator payload
#[derive(Debug, Clone, PartialEq)]
pub enum PlanKind {
    Invalid,
    SeqScan(SeqScanPlan),
    IndexScan(IndexScanPlan),
    Insert(InsertPlan),
    Delete(DeletePlan),
    Update(UpdatePlan),
    Limit(LimitPlan),
    NestedLoopJoin(NestedLoopJoinPlan),
    MergeJoin(MergeJoinPlan),
    Projection(ProjectionPlan),
    Materialize,
    Aggregate(AggregatePlan),
    OrderBy(OrderByPlan),
    /// A node kind the executor cannot run, named for diagnostics
    Unsupported(String),
}

impl PlanKind {
    /// The tag of this kind
    pub fn node_type(&self) -> PlanNodeType {
        match self {
            PlanKind::Invalid => PlanNodeType::Invalid,
            PlanKind::SeqScan(_) => PlanNodeType::SeqScan,
            PlanKind::IndexScan(_) => PlanNodeType::IndexScan,
            PlanKind::Insert(_) => PlanNodeType::Insert,
            PlanKind::Delete(_) => PlanNodeType::Delete,
            PlanKind::Update(_) => PlanNodeType::Update,
            PlanKind::Limit(_) => PlanNodeType::Limit,
            PlanKind::NestedLoopJoin(_) => PlanNodeType::NestedLoopJoin,
            PlanKind::MergeJoin(_) => PlanNodeType::MergeJoin,
            PlanKind::Projection(_) => PlanNodeType::Projection,
            PlanKind::Materialize => PlanNodeType::Materialize,
            PlanKind::Aggregate(_) => PlanNodeType::Aggregate,
            PlanKind::OrderBy(_) => PlanNodeType::OrderBy,
            PlanKind::Unsupported(_) => PlanNodeType::Unsupported,
        }
    }
}

/// A node of a physical plan tree
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    kind: PlanKind,
    children: Vec<PlanNode>,
}

impl PlanNode {
    /// Create a leaf node
    pub fn new(kind: PlanKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    /// Append a child
    #[must_use]
    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children in order
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = PlanNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn kind(&self) -> &PlanKind {
        &self.kind
    }

    pub fn node_type(&self) -> PlanNodeType {
        self.kind.node_type()
    }

    pub fn children(&self) -> &[PlanNode] {
        &self.children
    }

    /// Number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(PlanNode::node_count).sum::<usize>()
    }

    pub fn seq_scan(table: impl Into<String>) -> Self {
        Self::new(PlanKind::SeqScan(SeqScanPlan {
            table: table.into(),
            predicate: None,
        }))
    }

    pub fn filtered_scan(table: impl Into<String>, predicate: Expr) -> Self {
        Self::new(PlanKind::SeqScan(SeqScanPlan {
            table: table.into(),
            predicate: Some(predicate),
        }))
    }

    pub fn index_scan(table: impl Into<String>, low: Option<Expr>, high: Option<Expr>) -> Self {
        Self::new(PlanKind::IndexScan(IndexScanPlan {
            table: table.into(),
            low,
            high,
            predicate: None,
        }))
    }

    pub fn insert(table: impl Into<String>, values: Vec<Vec<Expr>>) -> Self {
        Self::new(PlanKind::Insert(InsertPlan {
            table: table.into(),
            values,
        }))
    }

    pub fn delete(table: impl Into<String>) -> Self {
        Self::new(PlanKind::Delete(DeletePlan {
            table: table.into(),
        }))
    }

    pub fn update(table: impl Into<String>, assignments: Vec<(usize, Expr)>) -> Self {
        Self::new(PlanKind::Update(UpdatePlan {
            table: table.into(),
            assignments,
        }))
    }

    pub fn limit(limit: Option<u64>, offset: u64) -> Self {
        Self::new(PlanKind::Limit(LimitPlan { limit, offset }))
    }

    pub fn nested_loop_join(predicate: Option<Expr>) -> Self {
        Self::new(PlanKind::NestedLoopJoin(NestedLoopJoinPlan { predicate }))
    }

    pub fn merge_join(left_key: usize, right_key: usize) -> Self {
        Self::new(PlanKind::MergeJoin(MergeJoinPlan {
            left_key,
            right_key,
        }))
    }

    pub fn projection(columns: Vec<ProjectColumn>) -> Self {
        Self::new(PlanKind::Projection(ProjectionPlan { columns }))
    }

    pub fn materialize() -> Self {
        Self::new(PlanKind::Materialize)
    }

    pub fn aggregate(group_by: Vec<usize>, aggregates: Vec<AggregateExpr>) -> Self {
        Self::new(PlanKind::Aggregate(AggregatePlan {
            group_by,
            aggregates,
        }))
    }

    pub fn order_by(keys: Vec<SortKey>) -> Self {
        Self::new(PlanKind::OrderBy(OrderByPlan { keys }))
    }

    pub fn unsupported(name: impl Into<String>) -> Self {
        Self::new(PlanKind::Unsupported(name.into()))
    }
}
