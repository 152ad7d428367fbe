//! Schema and metadata types discovered from the source catalog.

use serde::{Deserialize, Serialize};

/// A table as enumerated by the source catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTable {
    /// Catalog identifier the table belongs to (for Access, the database file path).
    pub catalog: Option<String>,

    /// Table name.
    pub name: String,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Source type name as reported by the driver (e.g. "COUNTER", "LONG INTEGER").
    pub type_name: String,

    /// Column size (character length or numeric precision).
    pub size: i32,

    /// Decimal digits; only meaningful for fixed-precision numerics.
    pub decimal_digits: i32,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            size: 0,
            decimal_digits: 0,
        }
    }

    /// Set size and decimal digits.
    pub fn with_precision(mut self, size: i32, decimal_digits: i32) -> Self {
        self.size = size;
        self.decimal_digits = decimal_digits;
        self
    }
}

/// One row of the source relationship catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Relationship name.
    pub name: String,

    /// Referencing column in the owning table.
    pub column: String,

    /// Referenced table.
    pub ref_table: String,

    /// Referenced column.
    pub ref_column: String,
}

/// Foreign key metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Relationship name in the source.
    pub name: String,

    /// Local column.
    pub column: String,

    /// Schema of the referenced table on the target.
    pub ref_schema: String,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column.
    pub ref_column: String,
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions, in source catalog order.
    pub columns: Vec<Column>,

    /// Foreign key constraints, at most one per local column.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Check if the table references any other table.
    pub fn has_foreign_keys(&self) -> bool {
        !self.foreign_keys.is_empty()
    }
}
