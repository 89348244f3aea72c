//! Row batches passed between operators
//!
//! A [`BaseTile`] owns a block of rows. A [`LogicalTile`] is a view over
//! one or more shared base tiles: a column map picks which base-tile
//! columns are visible, and one position list per base tile picks which
//! rows form each visible (logical) row.
//!
//! Operators that build their output from scratch (projection,
//! aggregation, ordering, materialization) emit *physical* tiles, where
//! base tile 0 holds exactly the visible rows in order. Scans, joins and
//! limits emit views, which must be materialized before a consumer walks
//! base tile 0 directly.

use std::sync::Arc;

use crate::catalog::DataType;

use super::datum::Datum;
use super::error::{ExecutorError, ExecutorResult};
use super::row::Row;

/// Output column metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    pub name: String,
    pub data_type: DataType,
}

impl SchemaColumn {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of output columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<SchemaColumn>,
}

impl Schema {
    pub fn new(columns: Vec<SchemaColumn>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&SchemaColumn> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }
}

/// A block of rows, optionally tagged with the storage key of each row
#[derive(Debug, Clone)]
pub struct BaseTile {
    schema: Schema,
    rows: Vec<Row>,
    locations: Option<Vec<i64>>,
}

impl BaseTile {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self {
            schema,
            rows,
            locations: None,
        }
    }

    /// Rows read from a table; `locations[i]` is the key of `rows[i]`
    pub fn with_locations(
        schema: Schema,
        rows: Vec<Row>,
        locations: Vec<i64>,
    ) -> ExecutorResult<Self> {
        if rows.len() != locations.len() {
            return Err(ExecutorError::Internal(format!(
                "{} rows but {} locations",
                rows.len(),
                locations.len()
            )));
        }
        Ok(Self {
            schema,
            rows,
            locations: Some(locations),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, position: usize) -> Option<&Row> {
        self.rows.get(position)
    }

    /// Storage key of the row at `position`, if this tile came from a table
    pub fn location(&self, position: usize) -> Option<i64> {
        self.locations.as_ref()?.get(position).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Visible column: (base tile index, column index in that tile)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef {
    pub tile: usize,
    pub column: usize,
}

/// A view over shared base tiles
#[derive(Debug, Clone)]
pub struct LogicalTile {
    base_tiles: Vec<Arc<BaseTile>>,
    columns: Vec<ColumnRef>,
    /// One list per base tile, each `row_count()` long
    position_lists: Vec<Vec<usize>>,
}

impl LogicalTile {
    /// Physical tile: every row and column of `base` visible, in order
    pub fn from_base(base: BaseTile) -> Self {
        let positions = (0..base.len()).collect();
        Self::with_positions(Arc::new(base), positions)
    }

    /// View over one base tile exposing only the rows at `positions`
    pub fn with_positions(base: Arc<BaseTile>, positions: Vec<usize>) -> Self {
        let columns = (0..base.schema().len())
            .map(|column| ColumnRef { tile: 0, column })
            .collect();
        Self {
            base_tiles: vec![base],
            columns,
            position_lists: vec![positions],
        }
    }

    #[cfg(test)]
    pub(crate) fn without_base() -> Self {
        Self {
            base_tiles: Vec::new(),
            columns: Vec::new(),
            position_lists: Vec::new(),
        }
    }

    /// Concatenate matching rows of two tiles side by side
    ///
    /// Each `(l, r)` pair names a logical row of `left` and of `right`;
    /// output row `i` is `left[l] ++ right[r]` for the `i`th pair.
    pub fn join(left: &LogicalTile, right: &LogicalTile, pairs: &[(usize, usize)]) -> Self {
        let offset = left.base_tiles.len();

        let mut base_tiles = left.base_tiles.clone();
        base_tiles.extend(right.base_tiles.iter().cloned());

        let mut columns = left.columns.clone();
        columns.extend(right.columns.iter().map(|c| ColumnRef {
            tile: c.tile + offset,
            column: c.column,
        }));

        let mut position_lists = Vec::with_capacity(base_tiles.len());
        for list in &left.position_lists {
            position_lists.push(pairs.iter().map(|(l, _)| list[*l]).collect());
        }
        for list in &right.position_lists {
            position_lists.push(pairs.iter().map(|(_, r)| list[*r]).collect());
        }

        Self {
            base_tiles,
            columns,
            position_lists,
        }
    }

    /// Keep only the logical rows at `rows`, in that order
    pub fn select(&self, rows: &[usize]) -> Self {
        let position_lists = self
            .position_lists
            .iter()
            .map(|list| rows.iter().map(|r| list[*r]).collect())
            .collect();
        Self {
            base_tiles: self.base_tiles.clone(),
            columns: self.columns.clone(),
            position_lists,
        }
    }

    /// Number of visible rows
    pub fn row_count(&self) -> usize {
        self.position_lists.first().map_or(0, Vec::len)
    }

    pub fn base_tile_count(&self) -> usize {
        self.base_tiles.len()
    }

    pub fn base_tile(&self, index: usize) -> Option<&Arc<BaseTile>> {
        self.base_tiles.get(index)
    }

    /// Schema of the visible columns
    pub fn schema(&self) -> Schema {
        let columns = self
            .columns
            .iter()
            .filter_map(|c| self.base_tiles[c.tile].schema().column(c.column).cloned())
            .collect();
        Schema::new(columns)
    }

    /// Whether base tile 0 holds exactly the visible rows and columns
    pub fn is_physical(&self) -> bool {
        match self.base_tiles.as_slice() {
            [base] => {
                base.len() == self.row_count()
                    && self.position_lists[0].iter().enumerate().all(|(i, p)| i == *p)
                    && self.columns.len() == base.schema().len()
                    && self.columns.iter().enumerate().all(|(i, c)| c.column == i)
            }
            _ => false,
        }
    }

    /// Value at a visible (row, column)
    pub fn value(&self, row: usize, column: usize) -> ExecutorResult<&Datum> {
        let col = self
            .columns
            .get(column)
            .ok_or(ExecutorError::ColumnIndexOutOfBounds {
                index: column,
                row_len: self.columns.len(),
            })?;
        let position = self.position(row, col.tile)?;
        self.base_tiles[col.tile]
            .row(position)
            .ok_or_else(|| ExecutorError::Internal(format!("dangling row position {}", position)))?
            .get(col.column)
    }

    /// Position in base tile `tile` that backs logical row `row`
    pub fn position(&self, row: usize, tile: usize) -> ExecutorResult<usize> {
        self.position_lists
            .get(tile)
            .and_then(|list| list.get(row))
            .copied()
            .ok_or_else(|| {
                ExecutorError::Internal(format!("row {} not in tile (base tile {})", row, tile))
            })
    }

    /// Storage key behind logical row `row` in base tile `tile`
    pub fn location(&self, row: usize, tile: usize) -> ExecutorResult<Option<i64>> {
        let position = self.position(row, tile)?;
        Ok(self.base_tiles[tile].location(position))
    }

    /// Copy out logical row `row`
    pub fn row(&self, row: usize) -> ExecutorResult<Row> {
        let mut values = Vec::with_capacity(self.columns.len());
        for column in 0..self.columns.len() {
            values.push(self.value(row, column)?.clone());
        }
        Ok(Row::new(values))
    }

    /// Copy out every visible row in order
    pub fn rows(&self) -> ExecutorResult<Vec<Row>> {
        (0..self.row_count()).map(|i| self.row(i)).collect()
    }

    /// Flatten into a physical tile
    pub fn materialize(&self) -> ExecutorResult<LogicalTile> {
        let base = BaseTile::new(self.schema(), self.rows()?);
        Ok(LogicalTile::from_base(base))
    }
}

/// Forward-only iterator over the rows of one base tile
pub struct TupleIterator<'t> {
    tile: &'t BaseTile,
    next: usize,
}

impl<'t> TupleIterator<'t> {
    pub fn new(tile: &'t BaseTile) -> Self {
        Self { tile, next: 0 }
    }
}

impl<'t> Iterator for TupleIterator<'t> {
    type Item = &'t Row;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.tile.row(self.next)?;
        self.next += 1;
        Some(row)
    }
}
