//! Configuration type definitions.

use crate::ordering::OrderingStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// ODBC driver name registered by the Microsoft Access Database Engine.
pub const DEFAULT_ACCESS_DRIVER: &str = "Microsoft Access Driver (*.mdb, *.accdb)";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (Access file).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (Access) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the `.mdb` / `.accdb` file.
    pub path: PathBuf,

    /// ODBC driver name.
    #[serde(default = "default_access_driver")]
    pub driver: String,
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Echo every DDL statement and INSERT to stdout before executing it.
    #[serde(default)]
    pub print_query: bool,

    /// Rows per INSERT statement (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Table ordering strategy (default: topological).
    #[serde(default)]
    pub ordering: OrderingStrategy,

    /// Compare source and target row counts after the transfer.
    #[serde(default)]
    pub validate_counts: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            print_query: false,
            batch_size: default_batch_size(),
            ordering: OrderingStrategy::default(),
            validate_counts: false,
        }
    }
}

fn default_access_driver() -> String {
    DEFAULT_ACCESS_DRIVER.to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_batch_size() -> usize {
    1000
}
