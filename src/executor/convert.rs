//! Conversion of result rows into the caller's representation

use crate::catalog::DataType;

use super::datum::Datum;
use super::row::Row;

/// Expected shape of each result row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowDescriptor {
    pub columns: Vec<ColumnDesc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

impl RowDescriptor {
    pub fn new(columns: Vec<ColumnDesc>) -> Self {
        Self { columns }
    }

    /// Add a column
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(ColumnDesc::new(name, data_type));
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Turns an executor row into a host row
///
/// Returning `None` drops the row from the result without failing the
/// statement.
pub trait RowConverter {
    type Output;

    fn convert(&self, row: &Row, descriptor: &RowDescriptor) -> Option<Self::Output>;
}

/// Coerces every value to the descriptor's column type
///
/// Rows of the wrong arity, or with a value that has no representation in
/// the target type, are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedRowConverter;

impl RowConverter for TypedRowConverter {
    type Output = Row;

    fn convert(&self, row: &Row, descriptor: &RowDescriptor) -> Option<Row> {
        if row.len() != descriptor.len() {
            return None;
        }
        row.iter()
            .zip(&descriptor.columns)
            .map(|(value, column)| value.coerce_to(column.data_type))
            .collect::<Option<Vec<Datum>>>()
            .map(Row::new)
    }
}

/// Passes rows through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl RowConverter for IdentityConverter {
    type Output = Row;

    fn convert(&self, row: &Row, _descriptor: &RowDescriptor) -> Option<Row> {
        Some(row.clone())
    }
}
