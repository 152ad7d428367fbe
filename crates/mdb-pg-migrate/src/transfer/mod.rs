//! Data transfer engine.
//!
//! Tables are copied one at a time. Each table is read in bounded batches
//! and written inside a single target transaction, so a table is either
//! fully loaded or not loaded at all. The first failing table stops the run.

use crate::core::Row;
use crate::ddl::TablePlan;
use crate::error::{describe_pg_error, MigrateError, Result};
use crate::source::{RowReader, SourceCatalog};
use crate::target::{render_insert_literals, rows_per_statement, TargetDatabase};
use serde::Serialize;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Statistics from transferring one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferStats {
    /// Table name.
    pub table: String,

    /// Total rows transferred.
    pub rows: i64,

    /// INSERT statements issued.
    pub statements: usize,

    /// Time spent reading from the source.
    pub read_time: Duration,

    /// Time spent writing to the target.
    pub write_time: Duration,

    /// The source table had no rows; nothing was written.
    pub skipped_empty: bool,
}

/// Copies table data from the source to the target.
pub struct TransferEngine<'w> {
    schema: String,
    batch_size: usize,
    echo: Option<&'w mut dyn Write>,
}

impl<'w> TransferEngine<'w> {
    /// Create an engine writing into `schema`.
    pub fn new(schema: impl Into<String>, batch_size: usize) -> Self {
        Self {
            schema: schema.into(),
            batch_size,
            echo: None,
        }
    }

    /// Echo each INSERT, with its values inlined, to `out` before it runs.
    pub fn echo_to(mut self, out: &'w mut dyn Write) -> Self {
        self.echo = Some(out);
        self
    }

    /// Transfer every table in order, stopping at the first failure.
    ///
    /// Tables committed before the failure stay committed.
    pub async fn transfer_all<S, T>(
        &mut self,
        source: &S,
        target: &mut T,
        plans: &[TablePlan],
    ) -> Result<Vec<TransferStats>>
    where
        S: SourceCatalog + ?Sized,
        T: TargetDatabase,
    {
        let mut all = Vec::with_capacity(plans.len());
        for (i, plan) in plans.iter().enumerate() {
            debug!("Transferring table {}/{}: {}", i + 1, plans.len(), plan.name);
            let stats = self.transfer_table(source, target, plan).await?;
            all.push(stats);
        }
        Ok(all)
    }

    /// Transfer one table inside its own transaction.
    ///
    /// A table with no rows is skipped without opening a transaction. On
    /// error the transaction is rolled back and the source cursor released.
    pub async fn transfer_table<S, T>(
        &mut self,
        source: &S,
        target: &mut T,
        plan: &TablePlan,
    ) -> Result<TransferStats>
    where
        S: SourceCatalog + ?Sized,
        T: TargetDatabase,
    {
        let started = Instant::now();
        let mut stats = TransferStats {
            table: plan.name.clone(),
            ..Default::default()
        };
        let per_statement = rows_per_statement(self.batch_size, plan.columns.len());

        let mut reader = source
            .open_rows(&plan.name, &plan.columns, per_statement)
            .map_err(|e| as_transfer_error(&plan.name, e))?;

        let first = match next_non_empty(reader.as_mut(), &mut stats)
            .map_err(|e| as_transfer_error(&plan.name, e))?
        {
            Some(batch) => batch,
            None => {
                info!("{}: no rows, skipped", plan.name);
                stats.skipped_empty = true;
                return Ok(stats);
            }
        };

        target
            .begin()
            .await
            .map_err(|e| as_transfer_error(&plan.name, e))?;

        let loaded = self
            .load(reader.as_mut(), first, target, plan, per_statement, &mut stats)
            .await;
        drop(reader);

        match loaded {
            Ok(()) => {
                target
                    .commit()
                    .await
                    .map_err(|e| as_transfer_error(&plan.name, e))?;
            }
            Err(e) => {
                if let Err(rb) = target.rollback().await {
                    warn!("{}: rollback failed: {}", plan.name, rb);
                }
                return Err(as_transfer_error(&plan.name, e));
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        info!(
            "{}: transferred {} rows in {:.2}s ({} statements)",
            plan.name, stats.rows, elapsed, stats.statements
        );
        Ok(stats)
    }

    async fn load<T: TargetDatabase>(
        &mut self,
        reader: &mut dyn RowReader,
        first: Vec<Row>,
        target: &mut T,
        plan: &TablePlan,
        per_statement: usize,
        stats: &mut TransferStats,
    ) -> Result<()> {
        let mut batch = Some(first);

        while let Some(rows) = batch {
            for chunk in rows.chunks(per_statement) {
                if let Some(out) = self.echo.as_deref_mut() {
                    let stmt = render_insert_literals(&self.schema, &plan.name, &plan.columns, chunk)?;
                    writeln!(out, "{}", stmt)?;
                    out.flush()?;
                }

                let write_start = Instant::now();
                target
                    .insert_rows(&self.schema, &plan.name, &plan.columns, chunk)
                    .await?;
                stats.write_time += write_start.elapsed();
                stats.rows += chunk.len() as i64;
                stats.statements += 1;
            }
            debug!("{}: {} rows so far", plan.name, stats.rows);

            batch = next_non_empty(reader, stats)?;
        }

        for col in plan.columns.iter().filter(|c| c.is_serial()) {
            target.reset_serial(&self.schema, &plan.name, &col.name).await?;
        }

        Ok(())
    }
}

/// Next batch with at least one row, or `None` at end of scan.
fn next_non_empty(
    reader: &mut dyn RowReader,
    stats: &mut TransferStats,
) -> Result<Option<Vec<Row>>> {
    loop {
        let read_start = Instant::now();
        let batch = reader.next_batch()?;
        stats.read_time += read_start.elapsed();
        match batch {
            Some(rows) if rows.is_empty() => continue,
            other => return Ok(other),
        }
    }
}

/// Attribute an error to `table`, keeping the server's message for target
/// errors.
fn as_transfer_error(table: &str, err: MigrateError) -> MigrateError {
    match err {
        MigrateError::Transfer { .. } => err,
        MigrateError::Target(ref pg) => MigrateError::transfer(table, describe_pg_error(pg)),
        other => MigrateError::transfer(table, other.to_string()),
    }
}
