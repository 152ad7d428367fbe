//! Migration orchestrator - main workflow coordinator.

use crate::config::Config;
use crate::ddl::{DdlGenerator, TablePlan};
use crate::error::{MigrateError, Result};
use crate::ordering::order_tables;
use crate::source::{SchemaIntrospector, SourceCatalog};
use crate::target::TargetDatabase;
use crate::transfer::{TransferEngine, TransferStats};
use crate::typemap::UnsupportedColumn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use tracing::{debug, info, warn};

/// The two connections a run works over.
pub struct MigrationContext<S, T> {
    pub source: S,
    pub target: T,
}

/// Migration orchestrator.
pub struct Orchestrator<S, T> {
    config: Config,
    ctx: MigrationContext<S, T>,
    out: Box<dyn Write>,
}

/// Row counts for one table after transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountCheck {
    pub table: String,
    pub source_rows: i64,
    pub target_rows: i64,
}

impl CountCheck {
    pub fn matches(&self) -> bool {
        self.source_rows == self.target_rows
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// Target schema the tables were created in.
    pub schema: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Tables created on the target, in creation order.
    pub tables: Vec<String>,

    /// Total tables created.
    pub tables_total: usize,

    /// Tables that received rows.
    pub tables_success: usize,

    /// Tables with no source rows.
    pub tables_skipped: usize,

    /// Total rows transferred.
    pub rows_transferred: i64,

    /// Average throughput (rows/second).
    pub rows_per_second: i64,

    /// Columns dropped for lack of a type mapping.
    pub unsupported_columns: Vec<UnsupportedColumn>,

    /// Source/target row counts, when validation ran.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub count_checks: Vec<CountCheck>,
}

impl<S: SourceCatalog, T: TargetDatabase> Orchestrator<S, T> {
    /// Create a new orchestrator over already opened connections.
    pub fn new(config: Config, ctx: MigrationContext<S, T>) -> Self {
        Self {
            config,
            ctx,
            out: Box::new(std::io::stdout()),
        }
    }

    /// Send print-mode output to `out` instead of stdout.
    pub fn with_query_output(mut self, out: impl Write + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    /// Run the migration, then close the target session whatever the outcome.
    pub async fn run(mut self) -> Result<MigrationResult> {
        let outcome = self.execute().await;
        self.ctx.target.close().await;
        outcome
    }

    async fn execute(&mut self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let migration = self.config.migration.clone();

        info!("Starting migration run: {}", run_id);

        // Phase 1: Introspect source
        info!("Phase 1: Reading schema from {}", self.config.source.path.display());
        let introspector = SchemaIntrospector::new(&self.ctx.source);
        let schema = introspector.discover_schema_name()?;
        let tables = introspector.introspect(&schema)?;
        info!("Found {} tables to migrate into schema {}", tables.len(), schema);

        // Phase 2: Map types and order tables
        let (plans, unsupported_columns) = build_plans(tables.iter().map(TablePlan::from_table));
        let plans = order_tables(plans, migration.ordering)
            .map_err(|e| log_unsupported_on(e, &unsupported_columns))?;
        info!(
            "Table order ({}): {}",
            migration.ordering,
            plans.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        let (stats, count_checks) = self
            .load(&schema, &plans)
            .await
            .map_err(|e| log_unsupported_on(e, &unsupported_columns))?;

        let result = summarize(
            run_id,
            schema,
            started_at,
            &plans,
            &stats,
            unsupported_columns,
            count_checks,
        );
        log_summary(&result);

        let mismatched: Vec<String> = result
            .count_checks
            .iter()
            .filter(|c| !c.matches())
            .map(|c| format!("{} (source={}, target={})", c.table, c.source_rows, c.target_rows))
            .collect();
        if !mismatched.is_empty() {
            return Err(MigrateError::Validation(format!(
                "row counts differ for {}",
                mismatched.join(", ")
            )));
        }

        Ok(result)
    }

    /// Phases 3 to 5: recreate the schema, create tables, copy rows and
    /// optionally count them.
    async fn load(
        &mut self,
        schema: &str,
        plans: &[TablePlan],
    ) -> Result<(Vec<TransferStats>, Vec<CountCheck>)> {
        let migration = self.config.migration.clone();

        // Phase 3: Schema and DDL
        info!("Phase 3: Recreating schema {}", schema);
        let ddl = DdlGenerator::new(schema);
        self.run_script(ddl.schema_statements()?).await?;
        self.run_script(ddl.script(plans)?).await?;

        // Phase 4: Transfer data
        info!("Phase 4: Transferring data");
        let mut engine = TransferEngine::new(schema, migration.batch_size);
        if migration.print_query {
            engine = engine.echo_to(&mut *self.out);
        }
        let stats = engine
            .transfer_all(&self.ctx.source, &mut self.ctx.target, plans)
            .await?;

        // Phase 5: Validate
        let count_checks = if migration.validate_counts {
            info!("Phase 5: Validating row counts");
            self.validate(schema, plans).await?
        } else {
            Vec::new()
        };

        Ok((stats, count_checks))
    }

    /// Execute a statement script in one transaction, echoing it first in
    /// print mode.
    async fn run_script(&mut self, statements: Vec<String>) -> Result<()> {
        if self.config.migration.print_query {
            for stmt in &statements {
                writeln!(self.out, "{}", stmt)?;
                self.out.flush()?;
            }
        }
        debug!("Executing {} statements", statements.len());
        self.ctx.target.execute_batch(&statements).await
    }

    /// Compare source and target row counts for every table.
    pub async fn validate(&mut self, schema: &str, plans: &[TablePlan]) -> Result<Vec<CountCheck>> {
        let mut checks = Vec::with_capacity(plans.len());

        for plan in plans {
            let source_rows = self.ctx.source.row_count(&plan.name)?;
            let target_rows = self.ctx.target.row_count(schema, &plan.name).await?;
            let check = CountCheck {
                table: plan.name.clone(),
                source_rows,
                target_rows,
            };

            if check.matches() {
                info!("{}: {} rows (match)", plan.name, source_rows);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    plan.name, source_rows, target_rows
                );
            }
            checks.push(check);
        }

        Ok(checks)
    }
}

/// Drop tables left with no columns, and foreign keys pointing at any table
/// that will not exist on the target. Returns the remaining plans in
/// discovery order plus every dropped column.
pub fn build_plans(
    plans: impl IntoIterator<Item = TablePlan>,
) -> (Vec<TablePlan>, Vec<UnsupportedColumn>) {
    let mut kept = Vec::new();
    let mut skipped = HashSet::new();
    let mut unsupported = Vec::new();

    for plan in plans {
        unsupported.extend(plan.unsupported.iter().cloned());
        if plan.columns.is_empty() {
            warn!("{}: no supported columns, skipping table", plan.name);
            skipped.insert(plan.name.clone());
        } else {
            kept.push(plan);
        }
    }

    let migrated: HashSet<String> = kept.iter().map(|p| p.name.clone()).collect();
    for plan in &mut kept {
        plan.foreign_keys.retain(|fk| {
            if migrated.contains(&fk.ref_table) {
                return true;
            }
            if skipped.contains(&fk.ref_table) {
                warn!(
                    "{}: dropping foreign key {} to skipped table {}",
                    plan.name, fk.name, fk.ref_table
                );
            } else {
                warn!(
                    "{}: dropping foreign key {} to table {} which is not migrated",
                    plan.name, fk.name, fk.ref_table
                );
            }
            false
        });
    }

    (kept, unsupported)
}

fn summarize(
    run_id: String,
    schema: String,
    started_at: DateTime<Utc>,
    plans: &[TablePlan],
    stats: &[TransferStats],
    unsupported_columns: Vec<UnsupportedColumn>,
    count_checks: Vec<CountCheck>,
) -> MigrationResult {
    let completed_at = Utc::now();
    let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
    let rows_transferred: i64 = stats.iter().map(|s| s.rows).sum();
    let tables_skipped = stats.iter().filter(|s| s.skipped_empty).count();
    let rows_per_second = if duration > 0.0 {
        (rows_transferred as f64 / duration) as i64
    } else {
        rows_transferred
    };

    MigrationResult {
        run_id,
        status: "completed".to_string(),
        schema,
        duration_seconds: duration,
        started_at,
        completed_at,
        tables: plans.iter().map(|p| p.name.clone()).collect(),
        tables_total: plans.len(),
        tables_success: stats.len() - tables_skipped,
        tables_skipped,
        rows_transferred,
        rows_per_second,
        unsupported_columns,
        count_checks,
    }
}

fn log_summary(result: &MigrationResult) {
    info!(
        "Migration {}: {} tables, {} rows in {:.1}s ({} rows/sec)",
        result.status,
        result.tables_total,
        result.rows_transferred,
        result.duration_seconds,
        result.rows_per_second
    );
    if result.tables_skipped > 0 {
        info!("{} tables had no rows", result.tables_skipped);
    }
    log_unsupported(&result.unsupported_columns);
}

/// Report dropped columns before a failed run returns `err`.
fn log_unsupported_on(err: MigrateError, columns: &[UnsupportedColumn]) -> MigrateError {
    log_unsupported(columns);
    err
}

/// Warn about columns left out of the target.
fn log_unsupported(columns: &[UnsupportedColumn]) {
    if columns.is_empty() {
        return;
    }
    warn!(
        "{} columns were not migrated: {}",
        columns.len(),
        columns
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
