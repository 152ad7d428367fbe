//! Schema introspection over a [`SourceCatalog`].

use super::SourceCatalog;
use crate::core::{Column, ForeignKey, Table};
use crate::error::{MigrateError, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Reads tables, columns and foreign keys from the source catalog.
pub struct SchemaIntrospector<'a, S: SourceCatalog + ?Sized> {
    source: &'a S,
}

impl<'a, S: SourceCatalog + ?Sized> SchemaIntrospector<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Base name (no directory, no extension) of the catalog that owns the
    /// first source table.
    pub fn discover_schema_name(&self) -> Result<String> {
        let tables = self
            .source
            .list_tables()
            .map_err(|e| MigrateError::Introspection(format!("listing tables: {}", e)))?;

        let first = tables.first().ok_or_else(|| {
            MigrateError::Introspection("source exposes no tables".to_string())
        })?;

        first
            .catalog
            .as_deref()
            .and_then(catalog_base_name)
            .ok_or_else(|| {
                MigrateError::Introspection(format!(
                    "no catalog name reported for table {}",
                    first.name
                ))
            })
    }

    /// Table names in catalog enumeration order.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let tables = self
            .source
            .list_tables()
            .map_err(|e| MigrateError::Introspection(format!("listing tables: {}", e)))?;
        Ok(tables.into_iter().map(|t| t.name).collect())
    }

    /// Columns of `table` in catalog order.
    pub fn list_columns(&self, table: &str) -> Result<Vec<Column>> {
        self.source.list_columns(table).map_err(|e| {
            MigrateError::Introspection(format!("listing columns of {}: {}", table, e))
        })
    }

    /// Foreign keys owned by `table`, referencing tables in `schema`.
    ///
    /// Only the first relationship per local column is kept. An unreadable
    /// relationship catalog yields no foreign keys.
    pub fn list_foreign_keys(&self, table: &str, schema: &str) -> Vec<ForeignKey> {
        let relationships = match self.source.list_relationships(table) {
            Ok(rels) => rels,
            Err(e) => {
                warn!(
                    "Cannot read relationship catalog for {}: {}. Treating it as having no foreign keys",
                    table, e
                );
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut fks = Vec::new();
        for rel in relationships {
            if !seen.insert(rel.column.clone()) {
                debug!(
                    "{}: discarding relationship {} on already constrained column {}",
                    table, rel.name, rel.column
                );
                continue;
            }
            fks.push(ForeignKey {
                name: rel.name,
                column: rel.column,
                ref_schema: schema.to_string(),
                ref_table: rel.ref_table,
                ref_column: rel.ref_column,
            });
        }
        fks
    }

    /// Introspect every table, with foreign keys pointing into `schema`.
    pub fn introspect(&self, schema: &str) -> Result<Vec<Table>> {
        let names = self.list_tables()?;
        let mut tables = Vec::with_capacity(names.len());

        for name in names {
            let columns = self.list_columns(&name)?;
            let foreign_keys = self.list_foreign_keys(&name, schema);
            debug!(
                "{}: {} columns, {} foreign keys",
                name,
                columns.len(),
                foreign_keys.len()
            );
            tables.push(Table {
                name,
                columns,
                foreign_keys,
            });
        }

        info!(
            "Introspected {} tables from {} source",
            tables.len(),
            self.source.db_type()
        );
        Ok(tables)
    }
}

/// Strip directory and extension from a catalog identifier. Accepts both
/// `/` and `\` separators since Access reports Windows paths.
fn catalog_base_name(catalog: &str) -> Option<String> {
    let file = catalog.rsplit(['/', '\\']).next()?;
    let stem = Path::new(file).file_stem()?.to_str()?;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}
