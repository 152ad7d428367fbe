//! mdb-pg-migrate CLI - Microsoft Access to PostgreSQL migration.

mod prompt;

use clap::Parser;
use mdb_pg_migrate::config::DEFAULT_ACCESS_DRIVER;
use mdb_pg_migrate::error::{EXIT_SUCCESS, EXIT_USAGE_ERROR};
use mdb_pg_migrate::{
    Config, MigrateError, MigrationConfig, MigrationResult, OrderingStrategy, SourceConfig,
    TargetConfig,
};
use prompt::ConnectionValues;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "mdb-pg-migrate")]
#[command(about = "Migrate a Microsoft Access database to PostgreSQL")]
#[command(version)]
struct Cli {
    /// Access database file (.mdb or .accdb)
    #[arg(long = "mdbfile")]
    mdbfile: Option<PathBuf>,

    /// PostgreSQL host
    #[arg(long = "psql_host")]
    psql_host: Option<String>,

    /// PostgreSQL port
    #[arg(long = "psql_port")]
    psql_port: Option<u16>,

    /// PostgreSQL database
    #[arg(long = "psql_db")]
    psql_db: Option<String>,

    /// PostgreSQL user
    #[arg(long = "psql_user")]
    psql_user: Option<String>,

    /// PostgreSQL password
    #[arg(long = "psql_pass")]
    psql_pass: Option<String>,

    /// Print every statement to stdout before executing it
    #[arg(long = "print_query")]
    print_query: bool,

    /// Accepted for compatibility; every run recreates a schema named after the Access file
    #[arg(long = "use_schema")]
    use_schema: bool,

    /// Path to YAML configuration file; command-line values take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rows per INSERT batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Table ordering: topological or partition
    #[arg(long)]
    ordering: Option<String>,

    /// Compare source and target row counts after the transfer
    #[arg(long)]
    validate: bool,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also arrive here, on stdout.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE_ERROR)
            } else {
                ExitCode::from(EXIT_SUCCESS)
            };
        }
    };
    setup_logging(&cli.verbosity, &cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), MigrateError> {
    let output_json = cli.output_json;
    let config = resolve_config(cli)?;

    if !config.source.path.exists() {
        return Err(MigrateError::SourceNotFound(config.source.path.clone()));
    }

    let result = migrate(config).await?;

    if output_json {
        println!("{}", result.to_json()?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

#[cfg(feature = "odbc")]
async fn migrate(config: Config) -> Result<MigrationResult, MigrateError> {
    use mdb_pg_migrate::{MigrationContext, OdbcAccessSource, Orchestrator, PgTarget};

    let source = OdbcAccessSource::connect(&config.source)?;
    info!("Opened {}", config.source.path.display());
    let target = PgTarget::connect(&config.target).await?;
    info!(
        "Connected to PostgreSQL {}:{}/{}",
        config.target.host, config.target.port, config.target.database
    );

    Orchestrator::new(config, MigrationContext { source, target })
        .run()
        .await
}

#[cfg(not(feature = "odbc"))]
async fn migrate(_config: Config) -> Result<MigrationResult, MigrateError> {
    Err(MigrateError::Config(
        "this build has no ODBC support; rebuild with the 'odbc' feature".to_string(),
    ))
}

/// Merge the config file, command-line flags and interactive answers.
fn resolve_config(cli: Cli) -> Result<Config, MigrateError> {
    let file = cli.config.as_ref().map(Config::load).transpose()?;
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {:?}", path);
    }

    let mut values = ConnectionValues {
        mdbfile: cli
            .mdbfile
            .or_else(|| file.as_ref().map(|c| c.source.path.clone())),
        host: cli
            .psql_host
            .or_else(|| file.as_ref().map(|c| c.target.host.clone())),
        database: cli
            .psql_db
            .or_else(|| file.as_ref().map(|c| c.target.database.clone())),
        user: cli
            .psql_user
            .or_else(|| file.as_ref().map(|c| c.target.user.clone())),
        password: cli
            .psql_pass
            .or_else(|| file.as_ref().map(|c| c.target.password.clone())),
    };

    let mut migration = file
        .as_ref()
        .map(|c| c.migration.clone())
        .unwrap_or_default();
    migration.print_query |= cli.print_query;
    if cli.use_schema {
        debug!("--use_schema has no effect; the schema is always named after the source file");
    }
    migration.validate_counts |= cli.validate;
    if let Some(size) = cli.batch_size {
        migration.batch_size = size;
    }
    if let Some(ordering) = cli.ordering.as_deref() {
        migration.ordering = ordering.parse::<OrderingStrategy>()?;
    }

    let prompted = prompt::fill_missing(&mut values).map_err(prompt_error)?;
    if prompted {
        confirm_flags(&mut migration).map_err(prompt_error)?;
    }

    let port = cli
        .psql_port
        .or_else(|| file.as_ref().map(|c| c.target.port))
        .unwrap_or(5432);
    let driver = file
        .as_ref()
        .map(|c| c.source.driver.clone())
        .unwrap_or_else(|| DEFAULT_ACCESS_DRIVER.to_string());

    let config = Config {
        source: SourceConfig {
            path: values.mdbfile.unwrap_or_default(),
            driver,
        },
        target: TargetConfig {
            host: values.host.unwrap_or_default(),
            port,
            database: values.database.unwrap_or_default(),
            user: values.user.unwrap_or_default(),
            password: values.password.unwrap_or_default(),
        },
        migration,
    };
    config.validate()?;
    Ok(config)
}

fn confirm_flags(migration: &mut MigrationConfig) -> prompt::PromptResult<()> {
    migration.print_query = prompt::confirm_flag("Print queries", migration.print_query)?;
    Ok(())
}

fn prompt_error(e: prompt::PromptError) -> MigrateError {
    MigrateError::Config(e.to_string())
}

fn print_summary(result: &MigrationResult) {
    println!("\nMigration completed!");
    println!("  Run ID: {}", result.run_id);
    println!("  Schema: {}", result.schema);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Tables: {}/{} ({} empty)",
        result.tables_success, result.tables_total, result.tables_skipped
    );
    println!("  Rows: {}", result.rows_transferred);
    println!("  Throughput: {} rows/sec", result.rows_per_second);
    if !result.unsupported_columns.is_empty() {
        println!("  Columns not migrated:");
        for col in &result.unsupported_columns {
            println!("    {}", col);
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
