//! Plan tree compilation
//!
//! [`TreeBuilder`] turns a borrowed [`PlanNode`] tree into an operator
//! tree of the same shape. Node kinds with no operator (`Invalid`,
//! `Unsupported`) are either skipped or rejected depending on
//! [`UnsupportedNodePolicy`]. A skipped node contributes no operator; its
//! children attach to the nearest constructed ancestor instead.

use crate::config::{ExecutorConfig, UnsupportedNodePolicy};
use crate::plan::{PlanKind, PlanNode, PlanNodeType};
use crate::txn::Transaction;

use super::aggregate::AggregateExecutor;
use super::context::{ExecutorContext, ExecutorEnv};
use super::datum::Datum;
use super::delete::DeleteExecutor;
use super::error::{ExecutorError, ExecutorResult};
use super::insert::InsertExecutor;
use super::join::{MergeJoinExecutor, NestedLoopJoinExecutor};
use super::limit::LimitExecutor;
use super::materialize::MaterializationExecutor;
use super::project::ProjectionExecutor;
use super::scan::{IndexScanExecutor, SeqScanExecutor};
use super::sort::OrderByExecutor;
use super::update::UpdateExecutor;
use super::{BoxedExecutor, Executor};

/// A plan node that was left out of the operator tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationGap {
    pub node_type: PlanNodeType,
    /// Name of the node kind as the planner reported it
    pub name: String,
}

/// Result of compiling a plan tree
pub struct CompiledTree<'a> {
    /// `None` for an empty plan or one with no supported node
    pub root: Option<BoxedExecutor<'a>>,
    pub gaps: Vec<CompilationGap>,
}

/// Builds operator trees from plan trees
pub struct TreeBuilder<'a> {
    env: &'a ExecutorEnv,
    config: &'a ExecutorConfig,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(env: &'a ExecutorEnv, config: &'a ExecutorConfig) -> Self {
        Self { env, config }
    }

    /// Compile `plan` for one statement
    ///
    /// When the plan's root is skipped, the first operator built from its
    /// children becomes the root and the operators built from later
    /// children become its children.
    pub fn build(
        &self,
        plan: Option<&'a PlanNode>,
        params: &'a [Datum],
        txn: &'a Transaction,
    ) -> ExecutorResult<CompiledTree<'a>> {
        let mut gaps = Vec::new();
        let Some(plan) = plan else {
            return Ok(CompiledTree { root: None, gaps });
        };

        let mut built = self.build_subtree(plan, params, txn, &mut gaps)?.into_iter();
        let mut root = built.next();
        if let Some(root) = root.as_mut() {
            for orphan in built {
                root.add_child(orphan);
            }
        }

        tracing::debug!(
            txn_id = %txn.id(),
            plan_nodes = plan.node_count(),
            gaps = gaps.len(),
            "built operator tree"
        );
        Ok(CompiledTree { root, gaps })
    }

    /// Operators `node` contributes to its parent, in child order
    fn build_subtree(
        &self,
        node: &'a PlanNode,
        params: &'a [Datum],
        txn: &'a Transaction,
        gaps: &mut Vec<CompilationGap>,
    ) -> ExecutorResult<Vec<BoxedExecutor<'a>>> {
        match self.instantiate(node, params, txn) {
            Some(mut op) => {
                for child in node.children() {
                    for built in self.build_subtree(child, params, txn, gaps)? {
                        op.add_child(built);
                    }
                }
                Ok(vec![op])
            }
            None => {
                self.record_gap(node, gaps)?;
                let mut built = Vec::new();
                for child in node.children() {
                    built.extend(self.build_subtree(child, params, txn, gaps)?);
                }
                Ok(built)
            }
        }
    }

    /// Fail on the first node without an operator when the policy rejects them
    ///
    /// Needs no transaction, so callers can run it before acquiring one.
    pub fn check_supported(&self, plan: &PlanNode) -> ExecutorResult<()> {
        if self.config.unsupported_nodes == UnsupportedNodePolicy::Skip {
            return Ok(());
        }
        if !has_operator(plan) {
            return Err(ExecutorError::UnsupportedPlanNode {
                node_type: plan.node_type(),
                name: gap_name(plan),
            });
        }
        plan.children()
            .iter()
            .try_for_each(|child| self.check_supported(child))
    }

    /// Gaps of a plan in which no node has an operator, `None` otherwise
    ///
    /// Such a plan compiles to no tree at all, so callers can answer it
    /// without acquiring a transaction.
    pub fn unsupported_only(&self, plan: &PlanNode) -> Option<Vec<CompilationGap>> {
        fn collect(node: &PlanNode, gaps: &mut Vec<CompilationGap>) -> bool {
            if has_operator(node) {
                return false;
            }
            gaps.push(CompilationGap {
                node_type: node.node_type(),
                name: gap_name(node),
            });
            node.children().iter().all(|child| collect(child, gaps))
        }

        let mut gaps = Vec::new();
        collect(plan, &mut gaps).then_some(gaps)
    }

    fn record_gap(&self, node: &PlanNode, gaps: &mut Vec<CompilationGap>) -> ExecutorResult<()> {
        let name = gap_name(node);
        if self.config.unsupported_nodes == UnsupportedNodePolicy::Reject {
            return Err(ExecutorError::UnsupportedPlanNode {
                node_type: node.node_type(),
                name,
            });
        }
        tracing::warn!(node_type = ?node.node_type(), name = %name, "no operator for plan node, skipping");
        gaps.push(CompilationGap {
            node_type: node.node_type(),
            name,
        });
        Ok(())
    }

    /// Construct the operator for one node, without children
    fn instantiate(
        &self,
        node: &'a PlanNode,
        params: &'a [Datum],
        txn: &'a Transaction,
    ) -> Option<BoxedExecutor<'a>> {
        let env = self.env;
        let ctx = || ExecutorContext::new(txn, params);
        let op: BoxedExecutor<'a> = match node.kind() {
            PlanKind::Invalid | PlanKind::Unsupported(_) => return None,
            PlanKind::SeqScan(plan) => Box::new(SeqScanExecutor::new(node, plan, ctx(), env)),
            PlanKind::IndexScan(plan) => Box::new(IndexScanExecutor::new(node, plan, ctx(), env)),
            PlanKind::Insert(plan) => Box::new(InsertExecutor::new(node, plan, ctx(), env)),
            PlanKind::Delete(plan) => Box::new(DeleteExecutor::new(node, plan, ctx(), env)),
            PlanKind::Update(plan) => Box::new(UpdateExecutor::new(node, plan, ctx(), env)),
            PlanKind::Limit(plan) => Box::new(LimitExecutor::new(node, plan, ctx())),
            PlanKind::NestedLoopJoin(plan) => {
                Box::new(NestedLoopJoinExecutor::new(node, plan, ctx()))
            }
            PlanKind::MergeJoin(plan) => Box::new(MergeJoinExecutor::new(node, plan, ctx())),
            PlanKind::Projection(plan) => Box::new(ProjectionExecutor::new(node, plan, ctx())),
            PlanKind::Materialize => Box::new(MaterializationExecutor::new(node, ctx())),
            PlanKind::Aggregate(plan) => Box::new(AggregateExecutor::new(node, plan, ctx())),
            PlanKind::OrderBy(plan) => Box::new(OrderByExecutor::new(node, plan, ctx())),
        };
        Some(op)
    }
}

fn has_operator(node: &PlanNode) -> bool {
    !matches!(node.kind(), PlanKind::Invalid | PlanKind::Unsupported(_))
}

fn gap_name(node: &PlanNode) -> String {
    match node.kind() {
        PlanKind::Unsupported(name) => name.clone(),
        _ => format!("{:?}", node.node_type()),
    }
}

/// Whether operators of this type emit view tiles
fn emits_views(node_type: PlanNodeType) -> bool {
    matches!(
        node_type,
        PlanNodeType::MergeJoin
            | PlanNodeType::NestedLoopJoin
            | PlanNodeType::SeqScan
            | PlanNodeType::IndexScan
            | PlanNodeType::Limit
    )
}

/// Put a synthetic materialization operator over a view-producing root
pub fn add_materialization(root: Option<BoxedExecutor<'_>>) -> Option<BoxedExecutor<'_>> {
    let root = root?;
    if !emits_views(root.node_type()) {
        return Some(root);
    }
    tracing::debug!(node_type = ?root.node_type(), "materializing root");
    let mut materialize = MaterializationExecutor::synthetic();
    materialize.add_child(root);
    Some(Box::new(materialize))
}
