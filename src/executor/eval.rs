//! Expression evaluation
//!
//! Evaluates a plan [`Expr`] against a Row and the bound parameters.

use crate::plan::{BinaryOp, Expr};

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::row::Row;

/// Evaluate an expression against a row
pub fn eval(expr: &Expr, row: &Row, params: &[Datum]) -> ExecutorResult<Datum> {
    match expr {
        Expr::Column(index) => Ok(row.get(*index)?.clone()),

        Expr::Literal(value) => Ok(value.clone()),

        Expr::Param(index) => params
            .get(*index)
            .cloned()
            .ok_or(ExecutorError::ParamIndexOutOfBounds {
                index: *index,
                count: params.len(),
            }),

        Expr::BinaryOp { op, left, right } => {
            let lval = eval(left, row, params)?;
            let rval = eval(right, row, params)?;
            eval_binary_op(*op, &lval, &rval)
        }

        Expr::Negate(inner) => eval(inner, row, params)?
            .negate()
            .ok_or_else(|| ExecutorError::InvalidOperation("negation requires number".to_string())),

        Expr::Not(inner) => eval(inner, row, params)?
            .not()
            .ok_or_else(|| ExecutorError::InvalidOperation("NOT requires boolean".to_string())),

        Expr::IsNull { expr, negated } => {
            let is_null = eval(expr, row, params)?.is_null();
            Ok(Datum::Bool(is_null != *negated))
        }
    }
}

/// Evaluate a filter predicate; NULL counts as false
pub fn eval_predicate(expr: &Expr, row: &Row, params: &[Datum]) -> ExecutorResult<bool> {
    match eval(expr, row, params)? {
        Datum::Null => Ok(false),
        other => other.as_bool().ok_or(ExecutorError::TypeMismatch {
            expected: crate::catalog::DataType::Boolean,
            got: other.data_type(),
            context: format!("predicate {}", expr),
        }),
    }
}

/// Evaluate an expression that must not read any row column
pub fn eval_const(expr: &Expr, params: &[Datum]) -> ExecutorResult<Datum> {
    eval(expr, &Row::empty(), params)
}

fn eval_binary_op(op: BinaryOp, left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    // AND/OR have their own NULL rules
    let logical = matches!(op, BinaryOp::And | BinaryOp::Or);
    if !logical && (left.is_null() || right.is_null()) {
        return Ok(Datum::Null);
    }

    match op {
        BinaryOp::Add => eval_arith(op, left, right, i64::checked_add, |a, b| a + b),
        BinaryOp::Sub => eval_arith(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => eval_arith(op, left, right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => eval_div(left, right),
        BinaryOp::Mod => eval_mod(left, right),

        BinaryOp::Eq => Ok(Datum::Bool(left == right)),
        BinaryOp::NotEq => Ok(Datum::Bool(left != right)),
        BinaryOp::Lt => Ok(Datum::Bool(left < right)),
        BinaryOp::LtEq => Ok(Datum::Bool(left <= right)),
        BinaryOp::Gt => Ok(Datum::Bool(left > right)),
        BinaryOp::GtEq => Ok(Datum::Bool(left >= right)),

        BinaryOp::And => Ok(eval_and(left, right)),
        BinaryOp::Or => Ok(eval_or(left, right)),
    }
}

fn eval_arith(
    op: BinaryOp,
    left: &Datum,
    right: &Datum,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> ExecutorResult<Datum> {
    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => int_op(*a, *b).map(Datum::Int).ok_or_else(|| {
            ExecutorError::InvalidOperation(format!("integer overflow in {} {} {}", a, op.symbol(), b))
        }),
        (Datum::Float(a), Datum::Float(b)) => Ok(Datum::Float(float_op(*a, *b))),
        (Datum::Int(a), Datum::Float(b)) => Ok(Datum::Float(float_op(*a as f64, *b))),
        (Datum::Float(a), Datum::Int(b)) => Ok(Datum::Float(float_op(*a, *b as f64))),
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot apply {} to {:?} and {:?}",
            op.symbol(),
            left,
            right
        ))),
    }
}

fn eval_div(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    match right {
        Datum::Int(0) => {
            return Err(ExecutorError::InvalidOperation(
                "division by zero".to_string(),
            ))
        }
        Datum::Float(f) if *f == 0.0 => {
            return Err(ExecutorError::InvalidOperation(
                "division by zero".to_string(),
            ))
        }
        _ => {}
    }
    eval_arith(BinaryOp::Div, left, right, i64::checked_div, |a, b| a / b)
}

fn eval_mod(left: &Datum, right: &Datum) -> ExecutorResult<Datum> {
    if let Datum::Int(0) = right {
        return Err(ExecutorError::InvalidOperation(
            "modulo by zero".to_string(),
        ));
    }

    match (left, right) {
        (Datum::Int(a), Datum::Int(b)) => a.checked_rem(*b).map(Datum::Int).ok_or_else(|| {
            ExecutorError::InvalidOperation(format!("integer overflow in {} % {}", a, b))
        }),
        _ => Err(ExecutorError::InvalidOperation(format!(
            "cannot compute modulo of {:?} and {:?}",
            left, right
        ))),
    }
}

/// SQL AND with three-valued logic
fn eval_and(left: &Datum, right: &Datum) -> Datum {
    match (left.as_bool(), right.as_bool()) {
        (Some(false), _) | (_, Some(false)) => Datum::Bool(false),
        (Some(true), Some(true)) => Datum::Bool(true),
        _ => Datum::Null,
    }
}

/// SQL OR with three-valued logic
fn eval_or(left: &Datum, right: &Datum) -> Datum {
    match (left.as_bool(), right.as_bool()) {
        (Some(true), _) | (_, Some(true)) => Datum::Bool(true),
        (Some(false), Some(false)) => Datum::Bool(false),
        _ => Datum::Null,
    }
}
