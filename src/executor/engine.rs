//! Executor engine
//!
//! [`PlanExecutor`] runs one plan under one transaction:
//!
//! 1. look up the caller's transaction, starting an implicit one if absent
//! 2. compile the plan into an operator tree and materialize its root
//! 3. pull the tree to exhaustion, converting the rows of every tile
//! 4. commit or abort if this call owns the outcome
//! 5. tear the tree down and report the transaction's result

use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::Catalog;
use crate::config::ExecutorConfig;
use crate::plan::{explain, PlanNode};
use crate::storage::StorageEngine;
use crate::txn::{
    Transaction, TransactionId, TransactionRegistry, TransactionResult, TxnOutcome,
};

use super::builder::{add_materialization, CompilationGap, CompiledTree, TreeBuilder};
use super::context::ExecutorEnv;
use super::convert::{RowConverter, RowDescriptor, TypedRowConverter};
use super::datum::Datum;
use super::error::ExecutorResult;
use super::row::Row;
use super::tile::TupleIterator;
use super::{destroy_tree, BoxedExecutor};

/// Rows pulled out of an operator tree
#[derive(Debug)]
pub struct RunOutput<T> {
    pub rows: Vec<T>,
    /// `init` failed and no pull was attempted
    pub init_failed: bool,
}

/// Outcome of [`PlanExecutor::execute_plan`]
#[derive(Debug)]
pub struct PlanResult<T> {
    /// Converted rows in pull order; partial if execution failed
    pub rows: Vec<T>,
    /// Final result of the transaction
    pub result: TxnOutcome,
    /// Plan nodes that had no operator
    pub gaps: Vec<CompilationGap>,
}

impl<T> PlanResult<T> {
    fn empty() -> Self {
        Self {
            rows: Vec::new(),
            result: TxnOutcome::Success,
            gaps: Vec::new(),
        }
    }
}

/// Compiles and runs plan trees
pub struct PlanExecutor {
    env: ExecutorEnv,
    registry: Arc<dyn TransactionRegistry>,
    config: ExecutorConfig,
}

impl PlanExecutor {
    pub fn new(
        storage: Arc<dyn StorageEngine>,
        catalog: Arc<RwLock<Catalog>>,
        registry: Arc<dyn TransactionRegistry>,
        config: ExecutorConfig,
    ) -> Self {
        let env = ExecutorEnv::new(storage, catalog, config.tile_size);
        Self {
            env,
            registry,
            config,
        }
    }

    pub fn env(&self) -> &ExecutorEnv {
        &self.env
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<dyn TransactionRegistry> {
        &self.registry
    }

    /// Execute `plan` and convert its rows with [`TypedRowConverter`]
    pub async fn execute_plan_default(
        &self,
        plan: Option<&PlanNode>,
        params: &[Datum],
        descriptor: &RowDescriptor,
        txn_id: TransactionId,
    ) -> ExecutorResult<PlanResult<Row>> {
        self.execute_plan(plan, params, descriptor, txn_id, &TypedRowConverter)
            .await
    }

    /// Execute `plan` under transaction `txn_id`
    ///
    /// If no transaction is registered under `txn_id` one is started and
    /// closed by this call. A caller-supplied transaction is left open
    /// unless `init` fails. Operator failures are reported through the
    /// transaction result, not as `Err`. A plan with no supported node
    /// returns its gaps without starting a transaction.
    pub async fn execute_plan<C: RowConverter>(
        &self,
        plan: Option<&PlanNode>,
        params: &[Datum],
        descriptor: &RowDescriptor,
        txn_id: TransactionId,
        converter: &C,
    ) -> ExecutorResult<PlanResult<C::Output>> {
        let Some(plan) = plan else {
            return Ok(PlanResult::empty());
        };
        tracing::trace!(txn_id = %txn_id, plan = %explain(plan), "executing plan");

        let builder = TreeBuilder::new(&self.env, &self.config);
        // Reject before any transaction is touched
        builder.check_supported(plan)?;
        if let Some(gaps) = builder.unsupported_only(plan) {
            for gap in &gaps {
                tracing::warn!(node_type = ?gap.node_type, name = %gap.name, "no operator for plan node, skipping");
            }
            let result = self
                .registry
                .lookup(txn_id)
                .map_or(TxnOutcome::Success, |txn| txn.result());
            return Ok(PlanResult {
                rows: Vec::new(),
                result,
                gaps,
            });
        }

        let (txn, owned) = self.registry.lookup_or_begin(txn_id)?;
        tracing::debug!(txn_id = %txn_id, implicit = owned, "acquired transaction");

        let (root, gaps, compile_error) = match builder.build(Some(plan), params, &txn) {
            Ok(CompiledTree { root, gaps }) => (root, gaps, None),
            Err(e) => {
                txn.set_result(TxnOutcome::Failure);
                (None, Vec::new(), Some(e))
            }
        };
        let mut root = if self.config.materialize_root {
            add_materialization(root)
        } else {
            root
        };

        let output = match root.as_mut() {
            Some(root) => Self::run(root, &txn, descriptor, converter).await,
            None => RunOutput {
                rows: Vec::new(),
                init_failed: false,
            },
        };

        let finalized = self.finalize(&txn, owned, output.init_failed).await;
        if let Some(root) = root {
            destroy_tree(root);
        }

        if let Some(e) = compile_error {
            return Err(e);
        }
        Ok(PlanResult {
            rows: output.rows,
            result: finalized?,
            gaps,
        })
    }

    /// Pull `root` to exhaustion
    ///
    /// Every tile is read through base tile 0 in storage order. Failures
    /// are recorded on `txn` as [`TxnOutcome::Failure`]; rows gathered
    /// before an execution failure are kept.
    pub async fn run<C: RowConverter>(
        root: &mut BoxedExecutor<'_>,
        txn: &Transaction,
        descriptor: &RowDescriptor,
        converter: &C,
    ) -> RunOutput<C::Output> {
        let mut rows = Vec::new();

        if let Err(e) = root.init().await {
            tracing::warn!(txn_id = %txn.id(), error = %e, "operator tree init failed");
            txn.set_result(TxnOutcome::Failure);
            return RunOutput {
                rows,
                init_failed: true,
            };
        }

        let mut pulls = 0u64;
        loop {
            match root.execute().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::warn!(txn_id = %txn.id(), error = %e, pulls, "execution failed");
                    txn.set_result(TxnOutcome::Failure);
                    break;
                }
            }
            pulls += 1;

            // Mutations advance without producing tiles
            let Some(tile) = root.take_output() else {
                continue;
            };
            let Some(base) = tile.base_tile(0) else {
                tracing::warn!(txn_id = %txn.id(), node_type = ?root.node_type(), pulls, "tile without base tile, skipped");
                continue;
            };

            let mut dropped = 0usize;
            for row in TupleIterator::new(base) {
                match converter.convert(row, descriptor) {
                    Some(converted) => rows.push(converted),
                    None => dropped += 1,
                }
            }
            tracing::trace!(txn_id = %txn.id(), pulls, rows = base.len(), dropped, "consumed tile");
        }

        RunOutput {
            rows,
            init_failed: false,
        }
    }

    /// Commit or abort `txn` when this call is responsible for it
    ///
    /// An implicit transaction (`owned`) is always closed. A caller's
    /// transaction is closed only after an init failure; otherwise the
    /// caller decides. A failed commit turns into an abort.
    pub async fn finalize(
        &self,
        txn: &Transaction,
        owned: bool,
        init_failed: bool,
    ) -> TransactionResult<TxnOutcome> {
        if !(owned || init_failed) {
            return Ok(txn.result());
        }

        match txn.result() {
            TxnOutcome::Success => match self.registry.commit(txn).await {
                Ok(()) => tracing::debug!(txn_id = %txn.id(), "committed"),
                Err(e) => {
                    tracing::warn!(txn_id = %txn.id(), error = %e, "commit failed, aborting");
                    txn.set_result(TxnOutcome::Failure);
                    self.registry.abort(txn).await?;
                }
            },
            TxnOutcome::Failure => {
                self.registry.abort(txn).await?;
                tracing::debug!(txn_id = %txn.id(), "aborted");
            }
        }
        Ok(txn.result())
    }
}
