//! Row type - one logical record read out of a tile

use std::hash::{Hash, Hasher};

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};

/// A row of datums
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: Vec<Datum>,
}

impl Row {
    /// Create a new row with the given values
    pub fn new(values: Vec<Datum>) -> Self {
        Row { values }
    }

    /// Create an empty row
    pub fn empty() -> Self {
        Row { values: vec![] }
    }

    /// Number of columns in this row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a datum by index
    pub fn get(&self, index: usize) -> ExecutorResult<&Datum> {
        self.values
            .get(index)
            .ok_or(ExecutorError::ColumnIndexOutOfBounds {
                index,
                row_len: self.values.len(),
            })
    }

    /// Set a datum by index
    pub fn set(&mut self, index: usize, value: Datum) -> ExecutorResult<()> {
        let row_len = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or(ExecutorError::ColumnIndexOutOfBounds { index, row_len })?;
        *slot = value;
        Ok(())
    }

    /// Push a datum to the end of the row
    pub fn push(&mut self, value: Datum) {
        self.values.push(value);
    }

    /// All values as a slice
    pub fn values(&self) -> &[Datum] {
        &self.values
    }

    /// Take ownership of values
    pub fn into_values(self) -> Vec<Datum> {
        self.values
    }

    /// Project specific columns by indices
    pub fn project(&self, indices: &[usize]) -> ExecutorResult<Row> {
        let mut values = Vec::with_capacity(indices.len());
        for &idx in indices {
            values.push(self.get(idx)?.clone());
        }
        Ok(Row { values })
    }

    /// Iterate over the datums
    pub fn iter(&self) -> impl Iterator<Item = &Datum> {
        self.values.iter()
    }

    /// Concatenate two rows (for joins)
    pub fn concat_ref(left: &Row, right: &Row) -> Row {
        let mut values = Vec::with_capacity(left.len() + right.len());
        values.extend(left.values.iter().cloned());
        values.extend(right.values.iter().cloned());
        Row { values }
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for Row {}

impl Hash for Row {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for datum in &self.values {
            datum.hash(state);
        }
    }
}

impl From<Vec<Datum>> for Row {
    fn from(values: Vec<Datum>) -> Self {
        Row { values }
    }
}

impl IntoIterator for Row {
    type Item = Datum;
    type IntoIter = std::vec::IntoIter<Datum>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Datum;
    type IntoIter = std::slice::Iter<'a, Datum>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
