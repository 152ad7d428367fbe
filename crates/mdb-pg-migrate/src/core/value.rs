//! SQL value types for moving rows from the source to the target.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// A single row, one value per retained column.
pub type Row = Vec<SqlValue>;

/// SQL value enum for type-safe row handling.
///
/// The variants cover every source type the type mapper accepts. Typed NULLs
/// are not needed because every insert parameter is cast to the column's
/// target type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Text form used as a bound parameter. `None` binds SQL NULL.
    ///
    /// Every parameter is sent as text and cast server-side, so the
    /// representation must be accepted by the target type's input function.
    #[must_use]
    pub fn to_param(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(if *b { "t" } else { "f" }.to_string()),
            SqlValue::I16(n) => Some(n.to_string()),
            SqlValue::I32(n) => Some(n.to_string()),
            SqlValue::I64(n) => Some(n.to_string()),
            SqlValue::F32(n) => Some(n.to_string()),
            SqlValue::F64(n) => Some(n.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Decimal(d) => Some(d.to_string()),
            SqlValue::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        }
    }

    /// Render as a SQL literal, for printing statements.
    #[must_use]
    pub fn to_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            SqlValue::I16(n) => n.to_string(),
            SqlValue::I32(n) => n.to_string(),
            SqlValue::I64(n) => n.to_string(),
            SqlValue::F32(n) => n.to_string(),
            SqlValue::F64(n) => n.to_string(),
            SqlValue::Text(s) => format!("'{}'", escape_sql_string(s)),
            SqlValue::Decimal(d) => d.to_string(),
            SqlValue::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.6f")),
        }
    }
}

/// Escape a string for SQL literal use.
/// Doubles single quotes: `O'Brien` -> `O''Brien`
pub fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::I16(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
