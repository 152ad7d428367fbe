//! ODBC source for Access database files.
//!
//! **Requirements:**
//! - An ODBC driver manager (unixODBC on Linux/macOS, built in on Windows)
//! - An Access driver registered with it, by default
//!   `Microsoft Access Driver (*.mdb, *.accdb)`. On Linux the mdbtools ODBC
//!   driver can be registered under the same name.
//!
//! Values are fetched as text and converted per column type. Anything the
//! converter cannot parse is passed through as text and left to the target's
//! input function to accept or reject.

use super::{RowReader, SourceCatalog};
use crate::config::SourceConfig;
use crate::core::identifier::quote_access;
use crate::core::{CatalogTable, Column, Relationship, Row, SqlValue};
use crate::error::{MigrateError, Result};
use crate::typemap::{AccessType, MappedColumn};
use odbc_api::buffers::TextRowSet;
use odbc_api::{
    BlockCursor, Connection, ConnectionOptions, Cursor, Environment, IntoParameter,
    ResultSetMetadata,
};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Longest text value fetched per cell. Longer values fail the fetch
/// instead of being truncated.
const MAX_TEXT_BYTES: usize = 65536;

/// Rows fetched per round trip for catalog queries.
const CATALOG_FETCH_ROWS: usize = 1000;

// Zero-based result columns of SQLTables and SQLColumns.
const TABLES_CAT: usize = 0;
const TABLES_NAME: usize = 2;
const COLUMNS_TABLE_NAME: usize = 2;
const COLUMNS_COLUMN_NAME: usize = 3;
const COLUMNS_TYPE_NAME: usize = 5;
const COLUMNS_COLUMN_SIZE: usize = 6;
const COLUMNS_DECIMAL_DIGITS: usize = 8;

const RELATIONSHIPS_QUERY: &str = "SELECT szColumn, szReferencedObject, szReferencedColumn, \
     szRelationship FROM MSysRelationships WHERE szObject = ?";

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Process-wide ODBC environment. Connections borrow from it, so it lives
/// for the rest of the process once created.
fn environment() -> Result<&'static Environment> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new().map_err(|e| {
        MigrateError::connection(
            format!(
                "Failed to create ODBC environment: {}. \
                 Make sure an ODBC driver manager is installed \
                 (Linux: apt install unixodbc).",
                e
            ),
            "ODBC environment",
        )
    })?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

/// Connection string for an Access file through `driver`.
pub fn connection_string(config: &SourceConfig) -> String {
    format!(
        "Driver={{{}}};DBQ={};",
        config.driver,
        config.path.display()
    )
}

/// Access database reached over a single ODBC connection.
pub struct OdbcAccessSource {
    conn: Connection<'static>,
    path: String,
}

impl OdbcAccessSource {
    /// Open the Access file named in `config`.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the ODBC environment cannot be created,
    /// the driver is not registered, or the driver refuses the file.
    pub fn connect(config: &SourceConfig) -> Result<Self> {
        let env = environment()?;
        let path = config.path.display().to_string();

        let conn = env
            .connect_with_connection_string(&connection_string(config), ConnectionOptions::default())
            .map_err(|e| {
                MigrateError::connection(
                    format!("ODBC connection failed: {}", e),
                    format!("opening {} with driver {}", path, config.driver),
                )
            })?;

        info!("Connected to Access file {} via ODBC", path);
        Ok(Self { conn, path })
    }

    /// Run a catalog query and collect every row as text.
    fn collect_text_rows<C: Cursor>(cursor: Option<C>) -> Result<Vec<Vec<Option<String>>>> {
        let mut rows = Vec::new();

        let Some(mut cursor) = cursor else {
            return Ok(rows);
        };

        let num_cols = cursor
            .num_result_cols()
            .map_err(|e| MigrateError::Source(format!("Failed to get column count: {}", e)))?
            as usize;

        let buffers = TextRowSet::for_cursor(CATALOG_FETCH_ROWS, &mut cursor, Some(4096))
            .map_err(|e| MigrateError::Source(format!("Failed to create row buffer: {}", e)))?;

        let mut row_cursor = cursor
            .bind_buffer(buffers)
            .map_err(|e| MigrateError::Source(format!("Failed to bind buffer: {}", e)))?;

        while let Some(batch) = row_cursor
            .fetch()
            .map_err(|e| MigrateError::Source(format!("Failed to fetch rows: {}", e)))?
        {
            for row_idx in 0..batch.num_rows() {
                let row = (0..num_cols)
                    .map(|col_idx| {
                        batch
                            .at(col_idx, row_idx)
                            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
                    })
                    .collect();
                rows.push(row);
            }
        }

        Ok(rows)
    }

    fn current_catalog(&self) -> String {
        self.conn.current_catalog().unwrap_or_default()
    }
}

impl SourceCatalog for OdbcAccessSource {
    fn list_tables(&self) -> Result<Vec<CatalogTable>> {
        let catalog = self.current_catalog();
        let cursor = self
            .conn
            .tables(&catalog, "", "%", "TABLE")
            .map_err(|e| MigrateError::Source(format!("SQLTables failed: {}", e)))?;

        let tables = Self::collect_text_rows(Some(cursor))?
            .into_iter()
            .filter_map(|mut row| {
                let name = row.get_mut(TABLES_NAME)?.take()?;
                let catalog = row.get_mut(TABLES_CAT).and_then(Option::take);
                Some(CatalogTable { catalog, name })
            })
            .collect::<Vec<_>>();

        debug!("{}: {} user tables", self.path, tables.len());
        Ok(tables)
    }

    fn list_columns(&self, table: &str) -> Result<Vec<Column>> {
        let catalog = self.current_catalog();
        let cursor = self
            .conn
            .columns(&catalog, "", table, "%")
            .map_err(|e| MigrateError::Source(format!("SQLColumns failed for {}: {}", table, e)))?;

        let columns = Self::collect_text_rows(Some(cursor))?
            .into_iter()
            // The table argument is a pattern; `_` and `%` in names match more than one table.
            .filter(|row| cell(row, COLUMNS_TABLE_NAME).as_deref() == Some(table))
            .filter_map(|row| {
                let name = cell(&row, COLUMNS_COLUMN_NAME)?;
                let type_name = cell(&row, COLUMNS_TYPE_NAME).unwrap_or_default();
                Some(Column::new(name, type_name).with_precision(
                    parse_i32(cell(&row, COLUMNS_COLUMN_SIZE)),
                    parse_i32(cell(&row, COLUMNS_DECIMAL_DIGITS)),
                ))
            })
            .collect();

        Ok(columns)
    }

    fn list_relationships(&self, table: &str) -> Result<Vec<Relationship>> {
        let cursor = self
            .conn
            .execute(RELATIONSHIPS_QUERY, &table.into_parameter())
            .map_err(|e| {
                MigrateError::Source(format!("Failed to read MSysRelationships: {}", e))
            })?;

        let relationships = Self::collect_text_rows(cursor)?
            .into_iter()
            .filter_map(|row| {
                Some(Relationship {
                    column: cell(&row, 0)?,
                    ref_table: cell(&row, 1)?,
                    ref_column: cell(&row, 2)?,
                    name: cell(&row, 3).unwrap_or_default(),
                })
            })
            .collect();

        Ok(relationships)
    }

    fn open_rows<'a>(
        &'a self,
        table: &str,
        columns: &[MappedColumn],
        batch_size: usize,
    ) -> Result<Box<dyn RowReader + 'a>> {
        let sql = select_sql(table, columns)?;
        debug!("{}: {}", table, sql);

        let mut cursor = self
            .conn
            .execute(&sql, ())
            .map_err(|e| MigrateError::transfer(table, format!("Query failed: {} - SQL: {}", e, sql)))?
            .ok_or_else(|| MigrateError::transfer(table, "SELECT produced no result set"))?;

        let buffers = TextRowSet::for_cursor(batch_size.max(1), &mut cursor, Some(MAX_TEXT_BYTES))
            .map_err(|e| MigrateError::transfer(table, format!("Failed to create row buffer: {}", e)))?;

        let block = cursor
            .bind_buffer(buffers)
            .map_err(|e| MigrateError::transfer(table, format!("Failed to bind buffer: {}", e)))?;

        Ok(Box::new(OdbcRowReader {
            table: table.to_string(),
            types: columns.iter().map(|c| c.source_type).collect(),
            cursor: block,
        }))
    }

    fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_access(table)?);
        let cursor = self
            .conn
            .execute(&sql, ())
            .map_err(|e| MigrateError::Source(format!("Row count failed for {}: {}", table, e)))?;

        let rows = Self::collect_text_rows(cursor)?;
        rows.first()
            .and_then(|row| cell(row, 0))
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| MigrateError::Source(format!("Row count for {} was not a number", table)))
    }

    fn db_type(&self) -> &str {
        "access"
    }
}

/// Streams one table in batches of at most the buffer's row capacity.
struct OdbcRowReader<C: Cursor> {
    table: String,
    types: Vec<AccessType>,
    cursor: BlockCursor<C, TextRowSet>,
}

impl<C: Cursor> RowReader for OdbcRowReader<C> {
    fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
        let batch = self
            .cursor
            .fetch_with_truncation_check(true)
            .map_err(|e| MigrateError::transfer(&self.table, format!("Failed to fetch rows: {}", e)))?;

        let Some(batch) = batch else {
            return Ok(None);
        };

        let mut rows = Vec::with_capacity(batch.num_rows());
        for row_idx in 0..batch.num_rows() {
            let row = self
                .types
                .iter()
                .enumerate()
                .map(|(col_idx, ty)| {
                    let text = batch
                        .at(col_idx, row_idx)
                        .map(|bytes| String::from_utf8_lossy(bytes).to_string());
                    convert_text_to_sqlvalue(text, *ty)
                })
                .collect();
            rows.push(row);
        }
        Ok(Some(rows))
    }
}

/// `SELECT [c1], [c2] FROM [table]` over the retained columns only.
fn select_sql(table: &str, columns: &[MappedColumn]) -> Result<String> {
    let cols = columns
        .iter()
        .map(|c| quote_access(&c.name))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("SELECT {} FROM {}", cols.join(", "), quote_access(table)?))
}

fn cell(row: &[Option<String>], idx: usize) -> Option<String> {
    row.get(idx).cloned().flatten()
}

fn parse_i32(value: Option<String>) -> i32 {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

/// Convert a text value from ODBC to a SqlValue based on the column's Access type.
fn convert_text_to_sqlvalue(text: Option<String>, ty: AccessType) -> SqlValue {
    let Some(s) = text else {
        return SqlValue::Null;
    };

    let parsed = match ty {
        AccessType::VarChar | AccessType::LongChar => return SqlValue::Text(s),
        AccessType::Bit => match s.trim() {
            "1" | "-1" => Some(SqlValue::Bool(true)),
            "0" => Some(SqlValue::Bool(false)),
            other => other.to_lowercase().parse().ok().map(SqlValue::Bool),
        },
        AccessType::Byte => s.trim().parse::<u8>().ok().map(|v| SqlValue::I16(v as i16)),
        AccessType::Integer => s.trim().parse::<i16>().ok().map(SqlValue::I16),
        AccessType::Counter => s.trim().parse::<i32>().ok().map(SqlValue::I32),
        AccessType::LongInteger => s.trim().parse::<i64>().ok().map(SqlValue::I64),
        AccessType::Real => s.trim().parse::<f32>().ok().map(SqlValue::F32),
        AccessType::Double => s.trim().parse::<f64>().ok().map(SqlValue::F64),
        AccessType::DateTime => {
            let t = s.trim();
            chrono::NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S"))
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S%.f"))
                .or_else(|_| {
                    chrono::NaiveDate::parse_from_str(t, "%Y-%m-%d")
                        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
                })
                .ok()
                .map(SqlValue::DateTime)
        }
        AccessType::Currency | AccessType::Decimal => {
            let cleaned = s.trim().replace(['$', ','], "");
            rust_decimal::Decimal::from_str_exact(&cleaned)
                .or_else(|_| cleaned.parse::<rust_decimal::Decimal>())
                .ok()
                .map(SqlValue::Decimal)
        }
    };

    parsed.unwrap_or(SqlValue::Text(s))
}
