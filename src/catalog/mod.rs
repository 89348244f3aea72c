//! Catalog - table metadata consulted by scan and mutation operators
//!
//! Every table stores its rows under an integer key column. The key
//! column doubles as the row id in the storage key layout, which is what
//! lets index scans turn key bounds into storage ranges.

use std::collections::HashMap;

use crate::executor::tile::{Schema, SchemaColumn};

/// Column data types understood by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean (true/false)
    Boolean,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    BigInt,
    /// 64-bit floating point
    Double,
    /// Variable-length string with max length
    Varchar(u32),
    /// Unlimited text
    Text,
}

impl DataType {
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int | DataType::BigInt)
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Whether NULL values are allowed
    pub nullable: bool,
}

impl ColumnDef {
    /// Create a new column definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Set nullable
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Table definition
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    /// Table name
    pub name: String,
    /// Column definitions
    pub columns: Vec<ColumnDef>,
    /// Index of the integer key column (the row id)
    pub key_column: usize,
}

impl TableDef {
    /// Create a new table definition keyed on column 0
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            key_column: 0,
        }
    }

    /// Add a column
    #[must_use]
    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    /// Choose the key column
    #[must_use]
    pub fn key(mut self, index: usize) -> Self {
        self.key_column = index;
        self
    }

    /// Tile schema for rows of this table
    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| SchemaColumn::new(c.name.clone(), c.data_type))
                .collect(),
        )
    }
}

/// Catalog error
#[derive(Debug, Clone)]
pub enum CatalogError {
    /// Table already exists
    TableExists(String),
    /// Table not found
    TableNotFound(String),
    /// Key column is out of range or not an integer column
    InvalidKeyColumn(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::TableExists(name) => write!(f, "Table '{}' already exists", name),
            CatalogError::TableNotFound(name) => write!(f, "Table '{}' not found", name),
            CatalogError::InvalidKeyColumn(name) => {
                write!(f, "Table '{}' has no integer key column", name)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Table catalog
#[derive(Debug, Default)]
pub struct Catalog {
    /// Tables by name
    tables: HashMap<String, TableDef>,
}

impl Catalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// Create a table
    pub fn create_table(&mut self, def: TableDef) -> CatalogResult<()> {
        if self.tables.contains_key(&def.name) {
            return Err(CatalogError::TableExists(def.name.clone()));
        }
        match def.columns.get(def.key_column) {
            Some(col) if col.data_type.is_integer() => {}
            _ => return Err(CatalogError::InvalidKeyColumn(def.name.clone())),
        }
        self.tables.insert(def.name.clone(), def);
        Ok(())
    }

    /// Drop a table
    pub fn drop_table(&mut self, name: &str) -> CatalogResult<()> {
        if self.tables.remove(name).is_none() {
            return Err(CatalogError::TableNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Get a table definition
    pub fn get_table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    /// Check if a table exists
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDef {
        TableDef::new("users")
            .column(ColumnDef::new("id", DataType::Int).nullable(false))
            .column(ColumnDef::new("name", DataType::Varchar(255)))
    }

    #[test]
    fn test_catalog_create_drop_table() {
        let mut catalog = Catalog::new();

        catalog.create_table(users()).unwrap();
        assert!(catalog.table_exists("users"));

        assert!(matches!(
            catalog.create_table(users()),
            Err(CatalogError::TableExists(_))
        ));

        catalog.drop_table("users").unwrap();
        assert!(!catalog.table_exists("users"));
        assert!(catalog.drop_table("users").is_err());
    }

    #[test]
    fn test_key_column_must_be_integer() {
        let mut catalog = Catalog::new();
        let table = users().key(1);
        assert!(matches!(
            catalog.create_table(table),
            Err(CatalogError::InvalidKeyColumn(_))
        ));

        let table = users().key(7);
        assert!(catalog.create_table(table).is_err());
    }

    #[test]
    fn test_table_schema() {
        let table = users();
        let schema = table.schema();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.column(1).unwrap().name, "name");
        assert_eq!(schema.column(1).unwrap().data_type, DataType::Varchar(255));
        assert!(schema.column(2).is_none());
    }
}
