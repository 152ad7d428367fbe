//! In-memory source and target used by the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mdb_pg_migrate::config::{MigrationConfig, DEFAULT_ACCESS_DRIVER};
use mdb_pg_migrate::core::identifier::qualify_pg;
use mdb_pg_migrate::core::{CatalogTable, Relationship};
use mdb_pg_migrate::{
    Column, Config, MappedColumn, MigrateError, Result, Row, RowReader, SourceCatalog,
    SourceConfig, SqlValue, TargetConfig, TargetDatabase,
};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::io::Write;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

pub const CATALOG: &str = r"C:\Data\Northwind.mdb";

/// One table of the fake Access file. Rows hold a value for every column,
/// including the ones the type mapper drops.
#[derive(Clone)]
pub struct FakeTable {
    pub name: String,
    pub columns: Vec<Column>,
    pub relationships: Vec<Relationship>,
    pub rows: Vec<Row>,
}

impl FakeTable {
    pub fn new(name: &str, columns: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|(n, t)| Column::new(*n, *t)).collect(),
            relationships: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn references(mut self, column: &str, ref_table: &str, ref_column: &str) -> Self {
        self.relationships.push(Relationship {
            name: format!("{}{}", ref_table, self.name),
            column: column.to_string(),
            ref_table: ref_table.to_string(),
            ref_column: ref_column.to_string(),
        });
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }
}

#[derive(Default)]
pub struct FakeSource {
    pub tables: Vec<FakeTable>,
    pub relationships_denied: bool,
    /// Reported by `row_count` instead of the real count.
    pub count_override: Option<i64>,
    pub open_readers: Rc<Cell<usize>>,
}

impl FakeSource {
    pub fn new(tables: Vec<FakeTable>) -> Self {
        Self {
            tables,
            ..Default::default()
        }
    }

    fn table(&self, name: &str) -> Result<&FakeTable> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| MigrateError::Source(format!("no table {}", name)))
    }
}

impl SourceCatalog for FakeSource {
    fn list_tables(&self) -> Result<Vec<CatalogTable>> {
        Ok(self
            .tables
            .iter()
            .map(|t| CatalogTable {
                catalog: Some(CATALOG.to_string()),
                name: t.name.clone(),
            })
            .collect())
    }

    fn list_columns(&self, table: &str) -> Result<Vec<Column>> {
        Ok(self.table(table)?.columns.clone())
    }

    fn list_relationships(&self, table: &str) -> Result<Vec<Relationship>> {
        if self.relationships_denied {
            return Err(MigrateError::Source(
                "Records cannot be read; no read permission on 'MSysRelationships'".into(),
            ));
        }
        Ok(self.table(table)?.relationships.clone())
    }

    fn open_rows<'a>(
        &'a self,
        table: &str,
        columns: &[MappedColumn],
        batch_size: usize,
    ) -> Result<Box<dyn RowReader + 'a>> {
        let t = self.table(table)?;
        let indexes = columns
            .iter()
            .map(|c| {
                t.columns
                    .iter()
                    .position(|col| col.name == c.name)
                    .ok_or_else(|| MigrateError::Source(format!("no column {}", c.name)))
            })
            .collect::<Result<Vec<_>>>()?;

        let rows = t
            .rows
            .iter()
            .map(|row| indexes.iter().map(|&i| row[i].clone()).collect())
            .collect();

        self.open_readers.set(self.open_readers.get() + 1);
        Ok(Box::new(FakeReader {
            rows,
            batch_size,
            open: Rc::clone(&self.open_readers),
        }))
    }

    fn row_count(&self, table: &str) -> Result<i64> {
        Ok(self
            .count_override
            .unwrap_or(self.table(table)?.rows.len() as i64))
    }

    fn db_type(&self) -> &str {
        "fake-access"
    }
}

struct FakeReader {
    rows: Vec<Row>,
    batch_size: usize,
    open: Rc<Cell<usize>>,
}

impl RowReader for FakeReader {
    fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
        if self.rows.is_empty() {
            return Ok(None);
        }
        let n = self.batch_size.min(self.rows.len());
        Ok(Some(self.rows.drain(..n).collect()))
    }
}

impl Drop for FakeReader {
    fn drop(&mut self) {
        self.open.set(self.open.get() - 1);
    }
}

/// Calls observed by the fake target, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Script(Vec<String>),
    Begin,
    Commit,
    Rollback,
    Insert {
        table: String,
        columns: Vec<String>,
        rows: Vec<Row>,
    },
    ResetSerial {
        table: String,
        column: String,
    },
    Closed,
    /// One flush of print-mode output, without the trailing newline.
    Printed(String),
}

#[derive(Default)]
pub struct TargetState {
    pub events: Vec<Event>,
    /// Committed rows per qualified table name.
    pub tables: BTreeMap<String, Vec<Row>>,
    pending: Vec<(String, Row)>,
    in_transaction: bool,
}

/// Target that records every call and keeps committed rows in memory.
/// Clones share state, so a test can inspect it after the run consumed
/// its handle.
#[derive(Clone, Default)]
pub struct FakeTarget {
    pub state: Arc<Mutex<TargetState>>,
    pub fail_insert_on: Option<String>,
    pub fail_statement_containing: Option<String>,
}

impl FakeTarget {
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn rows(&self, schema: &str, table: &str) -> Option<Vec<Row>> {
        let key = qualify_pg(schema, table).unwrap();
        self.state.lock().unwrap().tables.get(&key).cloned()
    }

    pub fn inserts(&self) -> Vec<(String, Vec<String>, Vec<Row>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Insert {
                    table,
                    columns,
                    rows,
                } => Some((table, columns, rows)),
                _ => None,
            })
            .collect()
    }

    /// Print-mode output that records into this target's event log, so
    /// echoed text can be ordered against the calls it precedes.
    pub fn echo_sink(&self) -> EchoSink {
        EchoSink {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
        }
    }

    pub fn printed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Printed(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn scripts(&self) -> Vec<Vec<String>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Script(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

pub struct EchoSink {
    state: Arc<Mutex<TargetState>>,
    pending: Vec<u8>,
}

impl Write for EchoSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        self.state.lock().unwrap().events.push(Event::Printed(text));
        Ok(())
    }
}

/// Log output captured from the current thread.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route this thread's tracing events into the capture until the guard
    /// is dropped.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Whitespace-separated token at `skip`, e.g. the qualified table in
/// `CREATE TABLE "s"."t" (`. Test table names contain no spaces.
fn table_token(stmt: &str, skip: usize) -> Option<String> {
    stmt.split_whitespace().nth(skip).map(str::to_string)
}

#[async_trait]
impl TargetDatabase for FakeTarget {
    async fn execute_batch(&mut self, statements: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Script(statements.to_vec()));

        let mut staged = state.tables.clone();
        for stmt in statements {
            if let Some(bad) = &self.fail_statement_containing {
                if stmt.contains(bad.as_str()) {
                    return Err(MigrateError::schema_execution(stmt.as_str(), "simulated failure"));
                }
            }
            if stmt.starts_with("DROP TABLE IF EXISTS") {
                if let Some(name) = table_token(stmt, 4) {
                    staged.remove(&name);
                }
            } else if stmt.starts_with("CREATE TABLE") {
                if let Some(name) = table_token(stmt, 2) {
                    staged.insert(name, Vec::new());
                }
            } else if stmt.starts_with("DROP SCHEMA") {
                staged.clear();
            }
        }
        state.tables = staged;
        Ok(())
    }

    async fn begin(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        assert!(!state.in_transaction, "nested transaction");
        state.in_transaction = true;
        state.events.push(Event::Begin);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.in_transaction = false;
        let pending = std::mem::take(&mut state.pending);
        for (table, row) in pending {
            state.tables.entry(table).or_default().push(row);
        }
        state.events.push(Event::Commit);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.in_transaction = false;
        state.pending.clear();
        state.events.push(Event::Rollback);
        Ok(())
    }

    async fn insert_rows(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[MappedColumn],
        rows: &[Row],
    ) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        assert!(state.in_transaction, "insert outside a transaction");
        state.events.push(Event::Insert {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.name.clone()).collect(),
            rows: rows.to_vec(),
        });

        if self.fail_insert_on.as_deref() == Some(table) {
            return Err(MigrateError::transfer(table, "duplicate key value violates unique constraint"));
        }

        let key = qualify_pg(schema, table)?;
        for row in rows {
            state.pending.push((key.clone(), row.clone()));
        }
        Ok(rows.len() as u64)
    }

    async fn reset_serial(&mut self, _schema: &str, table: &str, column: &str) -> Result<()> {
        self.state.lock().unwrap().events.push(Event::ResetSerial {
            table: table.to_string(),
            column: column.to_string(),
        });
        Ok(())
    }

    async fn row_count(&mut self, schema: &str, table: &str) -> Result<i64> {
        let key = qualify_pg(schema, table)?;
        let state = self.state.lock().unwrap();
        Ok(state.tables.get(&key).map(|r| r.len() as i64).unwrap_or(0))
    }

    fn db_type(&self) -> &str {
        "fake-postgres"
    }

    async fn close(self) {
        self.state.lock().unwrap().events.push(Event::Closed);
    }
}

pub fn config(migration: MigrationConfig) -> Config {
    Config {
        source: SourceConfig {
            path: "Northwind.mdb".into(),
            driver: DEFAULT_ACCESS_DRIVER.to_string(),
        },
        target: TargetConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "northwind".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
        },
        migration,
    }
}

pub fn row(values: Vec<SqlValue>) -> Row {
    values
}

/// Northwind-shaped sample: Customers (with a dropped OLEOBJECT column),
/// Orders referencing Customers, and an empty Shippers table.
pub fn northwind() -> Vec<FakeTable> {
    vec![
        FakeTable::new(
            "Orders",
            &[("OrderID", "COUNTER"), ("CustomerID", "LONG INTEGER"), ("Freight", "CURRENCY")],
        )
        .references("CustomerID", "Customers", "CustomerID")
        .with_rows(vec![
            row(vec![SqlValue::I32(10248), SqlValue::I64(1), "32.38".into()]),
            row(vec![SqlValue::I32(10249), SqlValue::I64(2), "11.61".into()]),
            row(vec![SqlValue::I32(10250), SqlValue::I64(1), SqlValue::Null]),
        ]),
        FakeTable::new(
            "Customers",
            &[("CustomerID", "COUNTER"), ("Logo", "OLEOBJECT"), ("CompanyName", "VARCHAR")],
        )
        .with_rows(vec![
            row(vec![SqlValue::I32(1), "0x89504E47".into(), "Alfreds Futterkiste".into()]),
            row(vec![SqlValue::I32(2), SqlValue::Null, "Ana Trujillo's".into()]),
        ]),
        FakeTable::new("Shippers", &[("ShipperID", "COUNTER"), ("CompanyName", "VARCHAR")]),
    ]
}
