//! DDL generation for the target schema.
//!
//! Statements are produced as a list so the executor can run them one by
//! one inside a single transaction and report exactly which one failed.

use crate::core::identifier::{qualify_pg, quote_pg};
use crate::core::{ForeignKey, Table};
use crate::error::Result;
use crate::typemap::{map_columns, MappedColumn, UnsupportedColumn};
use serde::Serialize;
use tracing::warn;

/// A table after type mapping: what will actually be created and loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePlan {
    /// Table name.
    pub name: String,

    /// Retained columns in source order. The same list drives CREATE TABLE,
    /// the source SELECT and the INSERT column list.
    pub columns: Vec<MappedColumn>,

    /// Foreign keys whose local column survived type mapping.
    pub foreign_keys: Vec<ForeignKey>,

    /// Columns dropped for lack of a type mapping.
    pub unsupported: Vec<UnsupportedColumn>,
}

impl TablePlan {
    /// Map a table's columns and drop foreign keys on columns that did not
    /// survive mapping.
    pub fn from_table(table: &Table) -> Self {
        let (columns, unsupported) = map_columns(table);

        let foreign_keys = table
            .foreign_keys
            .iter()
            .filter(|fk| {
                let kept = columns.iter().any(|c| c.name == fk.column);
                if !kept {
                    warn!(
                        "{}: dropping foreign key {} on unsupported column {}",
                        table.name, fk.name, fk.column
                    );
                }
                kept
            })
            .cloned()
            .collect();

        Self {
            name: table.name.clone(),
            columns,
            foreign_keys,
            unsupported,
        }
    }

    /// Whether the generated definition carries any foreign-key constraint.
    pub fn has_foreign_keys(&self) -> bool {
        !self.foreign_keys.is_empty()
    }

    /// Names of the retained columns, in order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Builds schema and table DDL for one target schema.
#[derive(Debug, Clone)]
pub struct DdlGenerator<'a> {
    schema: &'a str,
}

impl<'a> DdlGenerator<'a> {
    pub fn new(schema: &'a str) -> Self {
        Self { schema }
    }

    /// Statements that recreate the schema container.
    pub fn schema_statements(&self) -> Result<Vec<String>> {
        let schema = quote_pg(self.schema)?;
        Ok(vec![
            format!("DROP SCHEMA IF EXISTS {} CASCADE;", schema),
            format!("CREATE SCHEMA {};", schema),
        ])
    }

    /// `DROP TABLE IF EXISTS ... CASCADE;`
    pub fn drop_table(&self, plan: &TablePlan) -> Result<String> {
        Ok(format!(
            "DROP TABLE IF EXISTS {} CASCADE;",
            qualify_pg(self.schema, &plan.name)?
        ))
    }

    /// `CREATE TABLE` with mapped columns followed by foreign-key clauses.
    pub fn create_table(&self, plan: &TablePlan) -> Result<String> {
        let mut defs = Vec::with_capacity(plan.columns.len() + plan.foreign_keys.len());

        for col in &plan.columns {
            defs.push(format!("    {} {}", quote_pg(&col.name)?, col.target_type));
        }

        for fk in &plan.foreign_keys {
            defs.push(format!(
                "    FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                quote_pg(&fk.column)?,
                qualify_pg(&fk.ref_schema, &fk.ref_table)?,
                quote_pg(&fk.ref_column)?
            ));
        }

        Ok(format!(
            "CREATE TABLE {} (\n{}\n);",
            qualify_pg(self.schema, &plan.name)?,
            defs.join(",\n")
        ))
    }

    /// Drop and create statements for every plan, in the given order.
    pub fn script(&self, plans: &[TablePlan]) -> Result<Vec<String>> {
        let mut statements = Vec::with_capacity(plans.len() * 2);
        for plan in plans {
            statements.push(self.drop_table(plan)?);
            statements.push(self.create_table(plan)?);
        }
        Ok(statements)
    }
}
