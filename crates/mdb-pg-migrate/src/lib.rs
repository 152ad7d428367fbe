//! # mdb-pg-migrate
//!
//! Microsoft Access to PostgreSQL migration library.
//!
//! The library reads an Access database over ODBC and recreates it in
//! PostgreSQL:
//!
//! - **Introspection** of tables, columns and `MSysRelationships` foreign keys
//! - **Type mapping** from Access column types to PostgreSQL
//! - **Dependency ordering** so referenced tables are created and loaded first
//! - **Transactional transfer**, one transaction per table, in bounded batches
//!
//! ## Example
//!
//! ```rust,no_run
//! use mdb_pg_migrate::{Config, MigrationContext, OdbcAccessSource, Orchestrator, PgTarget};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("migrate.yaml")?;
//!     let source = OdbcAccessSource::connect(&config.source)?;
//!     let target = PgTarget::connect(&config.target).await?;
//!     let result = Orchestrator::new(config, MigrationContext { source, target })
//!         .run()
//!         .await?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod ddl;
pub mod error;
pub mod orchestrator;
pub mod ordering;
pub mod source;
pub mod target;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use crate::core::{Column, ForeignKey, Row, SqlValue, Table};
pub use ddl::{DdlGenerator, TablePlan};
pub use error::{MigrateError, Result};
pub use orchestrator::{MigrationContext, MigrationResult, Orchestrator};
pub use ordering::OrderingStrategy;
#[cfg(feature = "odbc")]
pub use source::OdbcAccessSource;
pub use source::{RowReader, SchemaIntrospector, SourceCatalog};
pub use target::{PgTarget, TargetDatabase};
pub use transfer::{TransferEngine, TransferStats};
pub use typemap::{AccessType, MappedColumn, UnsupportedColumn};
