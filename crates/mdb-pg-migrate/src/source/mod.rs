//! Source database operations.
//!
//! The source is read through a synchronous interface: ODBC calls block the
//! calling thread, and the pipeline never has more than one source call in
//! flight.

pub mod introspect;
#[cfg(feature = "odbc")]
pub mod odbc;

pub use introspect::SchemaIntrospector;
#[cfg(feature = "odbc")]
pub use odbc::OdbcAccessSource;

use crate::core::{CatalogTable, Column, Relationship, Row};
use crate::error::Result;
use crate::typemap::MappedColumn;

/// Trait for source catalog and data access.
pub trait SourceCatalog {
    /// Enumerate user tables in catalog order.
    fn list_tables(&self) -> Result<Vec<CatalogTable>>;

    /// Enumerate a table's columns in catalog order.
    fn list_columns(&self, table: &str) -> Result<Vec<Column>>;

    /// Query the relationship catalog for relationships owned by `table`,
    /// in catalog order.
    fn list_relationships(&self, table: &str) -> Result<Vec<Relationship>>;

    /// Open a full scan of `table` returning only `columns`, in that order.
    ///
    /// The reader releases its cursor when dropped.
    fn open_rows<'a>(
        &'a self,
        table: &str,
        columns: &[MappedColumn],
        batch_size: usize,
    ) -> Result<Box<dyn RowReader + 'a>>;

    /// Get the row count for a table.
    fn row_count(&self, table: &str) -> Result<i64>;

    /// Get the database type.
    fn db_type(&self) -> &str;
}

/// Pull-based reader over the rows of one table.
pub trait RowReader {
    /// Fetch the next batch of rows. `None` once the scan is exhausted.
    fn next_batch(&mut self) -> Result<Option<Vec<Row>>>;
}
