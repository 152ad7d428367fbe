//! Type mapping between Access and PostgreSQL.
//!
//! The mapping is a fixed table. A source type that is not in the table has
//! no target representation: the column is dropped from the table's DDL and
//! from every SELECT and INSERT for that table, and is reported as an
//! [`UnsupportedColumn`].

use crate::core::{Column, Table};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Access column types with a PostgreSQL mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    Counter,
    VarChar,
    LongChar,
    Byte,
    Integer,
    LongInteger,
    Real,
    Double,
    DateTime,
    Currency,
    Bit,
    Decimal,
}

impl AccessType {
    /// Parse the type name reported by the Access ODBC driver (case-insensitive).
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        match type_name.trim().to_uppercase().as_str() {
            "COUNTER" => Some(Self::Counter),
            "VARCHAR" => Some(Self::VarChar),
            "LONGCHAR" => Some(Self::LongChar),
            "BYTE" => Some(Self::Byte),
            "INTEGER" => Some(Self::Integer),
            "LONG INTEGER" => Some(Self::LongInteger),
            "REAL" => Some(Self::Real),
            "DOUBLE" => Some(Self::Double),
            "DATETIME" => Some(Self::DateTime),
            "CURRENCY" => Some(Self::Currency),
            "BIT" => Some(Self::Bit),
            "DECIMAL" => Some(Self::Decimal),
            _ => None,
        }
    }

    /// Column type expression used in CREATE TABLE.
    pub fn target_type(&self, size: i32, decimal_digits: i32) -> String {
        match self {
            Self::Counter => "serial PRIMARY KEY".to_string(),
            Self::VarChar | Self::LongChar => "varchar".to_string(),
            Self::Byte => "smallint".to_string(),
            Self::Integer => "int".to_string(),
            Self::LongInteger => "bigint".to_string(),
            Self::Real => "real".to_string(),
            Self::Double => "double precision".to_string(),
            Self::DateTime => "timestamp".to_string(),
            Self::Currency => "money".to_string(),
            Self::Bit => "boolean".to_string(),
            Self::Decimal => format!("numeric({},{})", size, decimal_digits),
        }
    }

    /// Type a text parameter is cast to in INSERT statements.
    pub fn insert_cast(&self, size: i32, decimal_digits: i32) -> String {
        match self {
            Self::Counter => "integer".to_string(),
            other => other.target_type(size, decimal_digits),
        }
    }
}

/// Map a source column to its target type expression.
///
/// Returns `None` when the source type has no mapping.
pub fn map_type(column: &Column) -> Option<String> {
    AccessType::from_type_name(&column.type_name)
        .map(|t| t.target_type(column.size, column.decimal_digits))
}

/// A column retained after type mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedColumn {
    /// Column name.
    pub name: String,

    /// Parsed source type.
    pub source_type: AccessType,

    /// Target type expression for DDL.
    pub target_type: String,

    /// Target type used to cast insert parameters.
    pub insert_cast: String,
}

impl MappedColumn {
    /// Whether the target column is backed by a sequence.
    pub fn is_serial(&self) -> bool {
        self.source_type == AccessType::Counter
    }
}

/// A column dropped because its source type has no mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsupportedColumn {
    pub table: String,
    pub column: String,
    pub type_name: String,
}

impl std::fmt::Display for UnsupportedColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} ({})", self.table, self.column, self.type_name)
    }
}

/// Map every column of a table, preserving column order.
///
/// Unsupported columns are logged and returned separately.
pub fn map_columns(table: &Table) -> (Vec<MappedColumn>, Vec<UnsupportedColumn>) {
    let mut mapped = Vec::with_capacity(table.columns.len());
    let mut unsupported = Vec::new();

    for col in &table.columns {
        match AccessType::from_type_name(&col.type_name) {
            Some(source_type) => mapped.push(MappedColumn {
                name: col.name.clone(),
                source_type,
                target_type: source_type.target_type(col.size, col.decimal_digits),
                insert_cast: source_type.insert_cast(col.size, col.decimal_digits),
            }),
            None => {
                warn!(
                    "Column {}.{} has unsupported type {}, skipping",
                    table.name, col.name, col.type_name
                );
                unsupported.push(UnsupportedColumn {
                    table: table.name.clone(),
                    column: col.name.clone(),
                    type_name: col.type_name.clone(),
                });
            }
        }
    }

    (mapped, unsupported)
}
