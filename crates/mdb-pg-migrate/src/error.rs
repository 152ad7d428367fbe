//! Error types for the migration library.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for configuration and connection errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code clap uses for command-line usage errors. No `MigrateError`
/// maps to it.
pub const EXIT_USAGE_ERROR: u8 = 2;
/// Exit code when schema or DDL execution fails on the target.
pub const EXIT_SCHEMA_ERROR: u8 = 3;
/// Exit code when a table fails to transfer.
pub const EXIT_TRANSFER_ERROR: u8 = 4;
/// Exit code when foreign keys form a cycle.
pub const EXIT_CYCLE_ERROR: u8 = 5;
/// Exit code when the source file does not exist.
pub const EXIT_SOURCE_NOT_FOUND: u8 = 6;
/// Exit code for IO errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code when post-transfer row counts differ.
pub const EXIT_VALIDATION_ERROR: u8 = 8;
/// Exit code when the source catalog cannot be read or has no tables.
pub const EXIT_INTROSPECTION_ERROR: u8 = 9;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad CLI input)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source file given on the command line does not exist
    #[error("Source file does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Source or target could not be reached
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Source driver error outside of a specific phase
    #[error("Source database error: {0}")]
    Source(String),

    /// Target database error outside of a specific phase
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Source catalog unreadable or empty
    #[error("Schema introspection failed: {0}")]
    Introspection(String),

    /// A statement of the schema or DDL batch failed; the batch was rolled back
    #[error("Schema execution failed: {message}\n  Statement: {statement}")]
    SchemaExecution { statement: String, message: String },

    /// Foreign keys reference each other in a loop
    #[error("Cyclic foreign key dependency between tables: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// Row count validation failed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl Into<String>, context: impl Into<String>) -> Self {
        MigrateError::Connection {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a SchemaExecution error for the statement that failed
    pub fn schema_execution(statement: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::SchemaExecution {
            statement: statement.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_)
            | MigrateError::Connection { .. }
            | MigrateError::Yaml(_)
            | MigrateError::Json(_) => EXIT_CONFIG_ERROR,
            MigrateError::Source(_) | MigrateError::Introspection(_) => EXIT_INTROSPECTION_ERROR,
            MigrateError::Target(_) | MigrateError::SchemaExecution { .. } => EXIT_SCHEMA_ERROR,
            MigrateError::Transfer { .. } => EXIT_TRANSFER_ERROR,
            MigrateError::CyclicDependency(_) => EXIT_CYCLE_ERROR,
            MigrateError::SourceNotFound(_) => EXIT_SOURCE_NOT_FOUND,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Validation(_) => EXIT_VALIDATION_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Describe a PostgreSQL error, preferring the server's message over the
/// generic "db error" display.
pub fn describe_pg_error(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => match db.detail() {
            Some(detail) => format!("{} ({}): {}", db.message(), db.code().code(), detail),
            None => format!("{} ({})", db.message(), db.code().code()),
        },
        None => err.to_string(),
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
