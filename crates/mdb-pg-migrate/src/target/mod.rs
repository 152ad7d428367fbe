//! PostgreSQL target database operations.

use crate::config::TargetConfig;
use crate::core::identifier::{qualify_pg, quote_pg};
use crate::core::Row;
use crate::error::{describe_pg_error, MigrateError, Result};
use crate::typemap::MappedColumn;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info, warn};

/// PostgreSQL caps the number of bind parameters per statement.
pub const MAX_BIND_PARAMS: usize = 65535;

/// Trait for target database operations.
///
/// Calls are issued strictly one after another on a single session, so
/// transaction control is plain statements on that session.
#[async_trait]
pub trait TargetDatabase: Send {
    /// Run `statements` in order inside one transaction. On the first failure
    /// the transaction is rolled back and the failing statement is reported.
    async fn execute_batch(&mut self, statements: &[String]) -> Result<()>;

    /// Open a transaction.
    async fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Insert `rows` with one parameter-bound multi-row INSERT.
    /// Every row must have exactly one value per entry in `columns`.
    async fn insert_rows(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[MappedColumn],
        rows: &[Row],
    ) -> Result<u64>;

    /// Move the sequence behind a serial column past the loaded values.
    async fn reset_serial(&mut self, schema: &str, table: &str, column: &str) -> Result<()>;

    /// Get the row count for a table.
    async fn row_count(&mut self, schema: &str, table: &str) -> Result<i64>;

    /// Get the database type.
    fn db_type(&self) -> &str;

    /// End the session.
    async fn close(self);
}

/// PostgreSQL target over one `tokio-postgres` session.
pub struct PgTarget {
    client: Client,
    connection: JoinHandle<()>,
}

impl PgTarget {
    /// Connect to the target database.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let (client, connection) = config.pg_config().connect(NoTls).await.map_err(|e| {
            MigrateError::connection(
                describe_pg_error(&e),
                format!(
                    "connecting to PostgreSQL at {}:{}/{} as {}",
                    config.host, config.port, config.database, config.user
                ),
            )
        })?;

        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { client, connection })
    }
}

#[async_trait]
impl TargetDatabase for PgTarget {
    async fn execute_batch(&mut self, statements: &[String]) -> Result<()> {
        self.begin().await?;

        for stmt in statements {
            debug!("Executing: {}", stmt);
            if let Err(e) = self.client.batch_execute(stmt).await {
                let message = describe_pg_error(&e);
                if let Err(rb) = self.rollback().await {
                    warn!("Rollback after failed statement also failed: {}", rb);
                }
                return Err(MigrateError::schema_execution(stmt.as_str(), message));
            }
        }

        self.commit().await
    }

    async fn begin(&mut self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn insert_rows(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[MappedColumn],
        rows: &[Row],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = build_insert_sql(schema, table, columns, rows.len())?;
        let params = insert_params(table, columns, rows)?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let inserted = self.client.execute(sql.as_str(), &refs).await?;
        Ok(inserted)
    }

    async fn reset_serial(&mut self, schema: &str, table: &str, column: &str) -> Result<()> {
        let qualified = qualify_pg(schema, table)?;
        let col = quote_pg(column)?;

        // An empty table leaves the sequence so the next value is 1.
        let sql = format!(
            "SELECT setval(pg_get_serial_sequence($1, $2), COALESCE(MAX({col}), 1), MAX({col}) IS NOT NULL) FROM {qualified}"
        );
        self.client
            .query_one(sql.as_str(), &[&qualified, &column])
            .await?;

        debug!("Reset sequence for {}.{}.{}", schema, table, column);
        Ok(())
    }

    async fn row_count(&mut self, schema: &str, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", qualify_pg(schema, table)?);
        let row = self.client.query_one(sql.as_str(), &[]).await?;
        Ok(row.get(0))
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(self) {
        drop(self.client);
        if let Err(e) = self.connection.await {
            warn!("PostgreSQL connection task ended abnormally: {}", e);
        }
        debug!("PostgreSQL session closed");
    }
}

/// Most rows one INSERT can carry for `num_columns` columns, capped at
/// `batch_size`.
pub fn rows_per_statement(batch_size: usize, num_columns: usize) -> usize {
    let by_params = MAX_BIND_PARAMS / num_columns.max(1);
    batch_size.min(by_params).max(1)
}

/// Build a multi-row INSERT with one placeholder per value.
///
/// Every value is bound as text and cast to the column's type on the server,
/// so one statement shape works for every column type.
pub fn build_insert_sql(
    schema: &str,
    table: &str,
    columns: &[MappedColumn],
    num_rows: usize,
) -> Result<String> {
    if columns.is_empty() {
        return Err(MigrateError::transfer(table, "no columns to insert"));
    }
    if columns.len() * num_rows > MAX_BIND_PARAMS {
        return Err(MigrateError::transfer(
            table,
            format!(
                "{} rows x {} columns exceeds {} bind parameters",
                num_rows,
                columns.len(),
                MAX_BIND_PARAMS
            ),
        ));
    }

    let col_list = columns
        .iter()
        .map(|c| quote_pg(&c.name))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let mut idx = 1;
    let tuples: Vec<String> = (0..num_rows)
        .map(|_| {
            let placeholders: Vec<String> = columns
                .iter()
                .map(|c| {
                    let p = format!("${}::text::{}", idx, c.insert_cast);
                    idx += 1;
                    p
                })
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualify_pg(schema, table)?,
        col_list,
        tuples.join(", ")
    ))
}

/// Flatten rows into text parameters, checking each row's width.
fn insert_params(table: &str, columns: &[MappedColumn], rows: &[Row]) -> Result<Vec<Option<String>>> {
    let mut params = Vec::with_capacity(rows.len() * columns.len());
    for (i, row) in rows.iter().enumerate() {
        check_row_width(table, columns, i, row)?;
        params.extend(row.iter().map(|v| v.to_param()));
    }
    Ok(params)
}

fn check_row_width(table: &str, columns: &[MappedColumn], index: usize, row: &Row) -> Result<()> {
    if row.len() != columns.len() {
        return Err(MigrateError::transfer(
            table,
            format!(
                "row {} has {} values for {} columns",
                index,
                row.len(),
                columns.len()
            ),
        ));
    }
    Ok(())
}

/// Render an INSERT with values inlined as SQL literals, for printing.
pub fn render_insert_literals(
    schema: &str,
    table: &str,
    columns: &[MappedColumn],
    rows: &[Row],
) -> Result<String> {
    let col_list = columns
        .iter()
        .map(|c| quote_pg(&c.name))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let mut tuples = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        check_row_width(table, columns, i, row)?;
        let values: Vec<String> = row.iter().map(|v| v.to_literal()).collect();
        tuples.push(format!("({})", values.join(", ")));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {};",
        qualify_pg(schema, table)?,
        col_list,
        tuples.join(", ")
    ))
}
