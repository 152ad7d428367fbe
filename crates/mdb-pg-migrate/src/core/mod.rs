//! Core types shared by every migration phase.
//!
//! - [`schema`]: table, column and foreign-key metadata discovered from the source
//! - [`value`]: SQL values carried from source rows to target inserts
//! - [`identifier`]: identifier validation and quoting for both dialects

pub mod identifier;
pub mod schema;
pub mod value;

pub use schema::{CatalogTable, Column, ForeignKey, Relationship, Table};
pub use value::{Row, SqlValue};
