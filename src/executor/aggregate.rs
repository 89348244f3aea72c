//! Aggregate executor
//!
//! Implements GROUP BY with aggregate functions (COUNT, SUM, AVG, MIN, MAX).
//! The whole input is consumed on the first `execute`; the result is one
//! physical tile with the group columns followed by the aggregates.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::catalog::DataType;
use crate::plan::{AggregateExpr, AggregateFunc, AggregatePlan, Expr, PlanNode, PlanNodeType};

use super::context::ExecutorContext;
use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::eval::eval;
use super::row::Row;
use super::tile::{BaseTile, LogicalTile, Schema, SchemaColumn};
use super::{Executor, ExecutorBase};

/// Accumulator for a single aggregate function
#[derive(Debug, Clone)]
enum Accumulator {
    Count(i64),
    /// Integer sum until a float shows up
    Sum(Option<Datum>),
    Avg { sum: f64, count: i64 },
    Min(Option<Datum>),
    Max(Option<Datum>),
}

impl Accumulator {
    fn new(func: AggregateFunc) -> Self {
        match func {
            AggregateFunc::CountStar | AggregateFunc::Count => Accumulator::Count(0),
            AggregateFunc::Sum => Accumulator::Sum(None),
            AggregateFunc::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
            AggregateFunc::Min => Accumulator::Min(None),
            AggregateFunc::Max => Accumulator::Max(None),
        }
    }

    fn accumulate(&mut self, value: &Datum) -> ExecutorResult<()> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum(sum) => {
                let next = match (sum.take(), value) {
                    (Some(Datum::Int(a)), Datum::Int(b)) => {
                        Datum::Int(a.checked_add(*b).ok_or_else(|| {
                            ExecutorError::InvalidOperation("integer overflow in SUM".to_string())
                        })?)
                    }
                    (None, Datum::Int(_) | Datum::Float(_)) => value.clone(),
                    (acc, _) => {
                        let a = match &acc {
                            Some(acc) => numeric(acc, "SUM")?,
                            None => 0.0,
                        };
                        Datum::Float(a + numeric(value, "SUM")?)
                    }
                };
                *sum = Some(next);
            }
            Accumulator::Avg { sum, count } => {
                *sum += numeric(value, "AVG")?;
                *count += 1;
            }
            Accumulator::Min(min) => match min {
                Some(m) if *value >= *m => {}
                _ => *min = Some(value.clone()),
            },
            Accumulator::Max(max) => match max {
                Some(m) if *value <= *m => {}
                _ => *max = Some(value.clone()),
            },
        }
        Ok(())
    }

    fn finalize(&self) -> Datum {
        match self {
            Accumulator::Count(n) => Datum::Int(*n),
            Accumulator::Sum(sum) => sum.clone().unwrap_or(Datum::Null),
            Accumulator::Avg { sum, count } => {
                if *count == 0 {
                    Datum::Null
                } else {
                    Datum::Float(*sum / *count as f64)
                }
            }
            Accumulator::Min(min) => min.clone().unwrap_or(Datum::Null),
            Accumulator::Max(max) => max.clone().unwrap_or(Datum::Null),
        }
    }
}

fn not_numeric(value: &Datum, func: &str) -> ExecutorError {
    ExecutorError::TypeMismatch {
        expected: DataType::Double,
        got: value.data_type(),
        context: func.to_string(),
    }
}

fn numeric(value: &Datum, func: &str) -> ExecutorResult<f64> {
    match value {
        Datum::Int(i) => Ok(*i as f64),
        Datum::Float(f) => Ok(*f),
        _ => Err(not_numeric(value, func)),
    }
}

/// Output type of an aggregate over `input`
fn aggregate_type(agg: &AggregateExpr, input: &Schema) -> DataType {
    let arg_type = match &agg.arg {
        Some(Expr::Column(i)) => input.column(*i).map(|c| c.data_type),
        _ => None,
    };
    match agg.func {
        AggregateFunc::CountStar | AggregateFunc::Count => DataType::BigInt,
        AggregateFunc::Avg => DataType::Double,
        AggregateFunc::Sum => match arg_type {
            Some(t) if t.is_integer() => DataType::BigInt,
            _ => DataType::Double,
        },
        AggregateFunc::Min | AggregateFunc::Max => arg_type.unwrap_or(DataType::Double),
    }
}

/// Hash aggregate executor
pub struct AggregateExecutor<'a> {
    base: ExecutorBase<'a>,
    plan: &'a AggregatePlan,
    done: bool,
}

impl<'a> AggregateExecutor<'a> {
    pub fn new(node: &'a PlanNode, plan: &'a AggregatePlan, ctx: ExecutorContext<'a>) -> Self {
        Self {
            base: ExecutorBase::new(node, ctx),
            plan,
            done: false,
        }
    }

    fn output_schema(&self, input: &Schema) -> ExecutorResult<Schema> {
        let mut columns = Vec::with_capacity(self.plan.group_by.len() + self.plan.aggregates.len());
        for &index in &self.plan.group_by {
            let column = input
                .column(index)
                .ok_or(ExecutorError::ColumnIndexOutOfBounds {
                    index,
                    row_len: input.len(),
                })?;
            columns.push(column.clone());
        }
        for agg in &self.plan.aggregates {
            columns.push(SchemaColumn::new(agg.name.clone(), aggregate_type(agg, input)));
        }
        Ok(Schema::new(columns))
    }

    fn new_accumulators(&self) -> Vec<Accumulator> {
        self.plan
            .aggregates
            .iter()
            .map(|agg| Accumulator::new(agg.func))
            .collect()
    }

    /// Group `rows` in first-seen order and finalize every group
    fn aggregate_rows(&self, rows: &[Row]) -> ExecutorResult<Vec<Row>> {
        let params = self.base.params();
        let mut index: HashMap<Vec<Datum>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Datum>, Vec<Accumulator>)> = Vec::new();

        for row in rows {
            let key = row.project(&self.plan.group_by)?.into_values();
            let slot = match index.get(&key) {
                Some(slot) => *slot,
                None => {
                    groups.push((key.clone(), self.new_accumulators()));
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };

            let accumulators = &mut groups[slot].1;
            for (acc, agg) in accumulators.iter_mut().zip(&self.plan.aggregates) {
                let value = match (agg.func, &agg.arg) {
                    (AggregateFunc::CountStar, _) | (_, None) => Datum::Int(1),
                    (_, Some(arg)) => eval(arg, row, params)?,
                };
                acc.accumulate(&value)?;
            }
        }

        // Aggregates without GROUP BY produce one row even over empty input
        if groups.is_empty() && self.plan.group_by.is_empty() {
            groups.push((Vec::new(), self.new_accumulators()));
        }

        Ok(groups
            .into_iter()
            .map(|(mut values, accumulators)| {
                values.extend(accumulators.iter().map(Accumulator::finalize));
                Row::new(values)
            })
            .collect())
    }
}

#[async_trait]
impl<'a> Executor<'a> for AggregateExecutor<'a> {
    fn node_type(&self) -> PlanNodeType {
        PlanNodeType::Aggregate
    }

    fn base(&self) -> &ExecutorBase<'a> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExecutorBase<'a> {
        &mut self.base
    }

    async fn init(&mut self) -> ExecutorResult<()> {
        self.base.expect_children("Aggregate", 1, 1)?;
        self.done = false;
        self.base.init_children().await
    }

    async fn execute(&mut self) -> ExecutorResult<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;

        let (input, rows) = self.base.drain_child_rows(0).await?;
        let output = self.aggregate_rows(&rows)?;
        if output.is_empty() {
            return Ok(false);
        }

        let schema = self.output_schema(&input)?;
        self.base
            .set_output(LogicalTile::from_base(BaseTile::new(schema, output)));
        Ok(true)
    }
}
