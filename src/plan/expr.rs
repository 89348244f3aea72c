//! Scalar expressions embedded in plan nodes

use crate::executor::Datum;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

/// Scalar expression evaluated against one row
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column of the input row by position
    Column(usize),
    /// Constant
    Literal(Datum),
    /// Bound parameter by position (`$1` is `Param(0)`)
    Param(usize),
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
    Not(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
}

impl Expr {
    pub fn col(index: usize) -> Self {
        Expr::Column(index)
    }

    pub fn lit(value: impl Into<Datum>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn param(index: usize) -> Self {
        Expr::Param(index)
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    pub fn gt(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Gt, left, right)
    }

    pub fn lt(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Lt, left, right)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::And, left, right)
    }

    /// Whether evaluating this expression reads a row column
    pub fn references_columns(&self) -> bool {
        match self {
            Expr::Column(_) => true,
            Expr::Literal(_) | Expr::Param(_) => false,
            Expr::BinaryOp { left, right, .. } => {
                left.references_columns() || right.references_columns()
            }
            Expr::Negate(e) | Expr::Not(e) => e.references_columns(),
            Expr::IsNull { expr, .. } => expr.references_columns(),
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Column(i) => write!(f, "#{}", i),
            Expr::Literal(d) => write!(f, "{}", d),
            Expr::Param(i) => write!(f, "${}", i + 1),
            Expr::BinaryOp { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Negate(e) => write!(f, "-{}", e),
            Expr::Not(e) => write!(f, "NOT {}", e),
            Expr::IsNull { expr, negated } => {
                if *negated {
                    write!(f, "{} IS NOT NULL", expr)
                } else {
                    write!(f, "{} IS NULL", expr)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let expr = Expr::and(
            Expr::gt(Expr::col(0), Expr::param(0)),
            Expr::Not(Box::new(Expr::lit(false))),
        );
        assert_eq!(expr.to_string(), "((#0 > $1) AND NOT false)");
    }

    #[test]
    fn test_references_columns() {
        assert!(Expr::eq(Expr::lit(1), Expr::col(2)).references_columns());
        assert!(!Expr::eq(Expr::lit(1), Expr::param(0)).references_columns());
    }
}
