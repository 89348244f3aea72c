//! Insert executor
//!
//! Inserts literal rows, or every row produced by its child, into a table.

use async_trait::async_trait;

use crate::catalog::{ColumnDef, TableDef};
use crate::plan::{InsertPlan, PlanNode, PlanNodeType};

use super::context::{ExecutorContext, ExecutorEnv};
use super::datum::Datum;
use super::encoding::{encode_row, encode_row_key};
use super::error::{ExecutorError, ExecutorResult};
use super::eval::eval_const;
use super::row::Row;
use super::{Executor, ExecutorBase};

/// Coerce a value into a column, enforcing NOT NULL
pub(crate) fn coerce_value(
    table: &TableDef,
    column: &ColumnDef,
    value: &Datum,
) -> ExecutorResult<Datum> {
    if value.is_null() {
        if !column.nullable {
            return Err(ExecutorError::NullValue(format!(
                "{}.{}",
                table.name, column.name
            )));
        }
        return Ok(Datum::Null);
    }
    value
        .coerce_to(column.data_type)
        .ok_or_else(|| ExecutorError::TypeMismatch {
            expected: column.data_type,
            got: value.data_type(),
            context: format!("{}.{}", table.name, column.name),
        })
}

/// Coerce a full row into the table's column types
pub(crate) fn coerce_row(table: &TableDef, row: &Row) -> ExecutorResult<Row> {
    if row.len() != table.columns.len() {
        return Err(ExecutorError::InvalidPlan(format!(
            "table {} has {} columns, row has {}",
            table.name,
            table.columns.len(),
            row.len()
        )));
    }
    let values = table
        .columns
        .iter()
        .zip(row.iter())
        .map(|(column, value)| coerce_value(table, column, value))
        .collect::<ExecutorResult<Vec<_>>>()?;
    Ok(Row::new(values))
}

/// Integer key of a coerced row
pub(crate) fn row_key(table: &TableDef, row: &Row) -> ExecutorResult<i64> {
    match row.get(table.key_column)? {
        Datum::Int(k) => Ok(*k),
        Datum::Null => Err(ExecutorError::NullValue(format!(
            "{} key column",
            table.name
        ))),
        other => Err(ExecutorError::TypeMismatch {
            expected: table.columns[table.key_column].data_type,
            got: other.data_type(),
            context: format!("{} key column", table.name),
        }),
    }
}

/// Insert executor
pub struct InsertExecutor<'a> {
    base: ExecutorBase<'a>,
    plan: &'a InsertPlan,
    env: &'a ExecutorEnv,
    table: Option<TableDef>,
    done: bool,
    rows_affected: u64,
}

impl<'a> InsertExecutor<'a> {
    pub fn new(
        node: &'a PlanNode,
        plan: &'a InsertPlan,
        ctx: ExecutorContext<'a>,
        env: &'a ExecutorEnv,
    ) -> Self {
        Self {
            base: ExecutorBase::new(node, ctx),
            plan,
            env,
            table: None,
            done: false,
            rows_affected: 0,
        }
    }

    /// Rows written so far
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    async fn source_rows(&mut self) -> ExecutorResult<Vec<Row>> {
        if self.base.child_count() == 1 {
            let (_, rows) = self.base.drain_child_rows(0).await?;
            return Ok(rows);
        }
        let params = self.base.params();
        self.plan
            .values
            .iter()
            .map(|exprs| {
                exprs
                    .iter()
                    .map(|e| eval_const(e, params))
                    .collect::<ExecutorResult<Vec<_>>>()
                    .map(Row::new)
            })
            .collect()
    }
}

#[async_trait]
impl<'a> Executor<'a> for InsertExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::Insert
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("Insert", 0, 1)?;
        self.table = Some(self.env.table(&self.plan.table)?);
        self.base.init_children().await
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;

        let txn = self.base.ctx()?.txn();
        txn.ensure_active()?;

        let table = self
            .table
            .clone()
            .ok_or_else(|| ExecutorError::Internal("insert executed before init".to_string()))?;

        for row in self.source_rows().await? {
            let row = coerce_row(&table, &row)?;
            let key = row_key(&table, &row)?;
            let storage_key = encode_row_key(&table.name, key);

            if self.env.storage.get(&storage_key).await?.is_some() {
                return Err(ExecutorError::DuplicateKey {
                    table: table.name.clone(),
                    key,
                });
            }

            self.env.storage.put(&storage_key, &encode_row(&row)).await?;
            txn.undo_log().log_insert(&table.name, storage_key);
            self.rows_affected += 1;
        }

        tracing::debug!(
            txn_id = %txn.id(),
            table = %table.name,
            rows = self.rows_affected,
            "inserted"
        );
        Ok(true)
    }
}
