//! Identifier validation and quoting for the source and target dialects.
//!
//! SQL identifiers (schema, table and column names) cannot be bound as
//! parameters, so every identifier that reaches generated SQL goes through
//! this module. Access allows spaces and punctuation in names ("Order
//! Details"), which makes quoting mandatory on both sides, not just a
//! safety measure.

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted before quoting.
/// - PostgreSQL: 63 bytes (longer names are truncated by the server)
/// - Access: 64 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes
/// - Identifiers exceeding maximum length
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// Escapes double quotes by doubling them and wraps in double quotes.
///
/// ```ignore
/// assert_eq!(quote_pg("Order Details")?, "\"Order Details\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a PostgreSQL table name with schema.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}

/// Quote an Access (Jet SQL) identifier using brackets.
///
/// Jet has no escape for a closing bracket inside a bracketed name, so such
/// names are rejected rather than quoted incorrectly.
pub fn quote_access(name: &str) -> Result<String> {
    validate_identifier(name)?;
    if name.contains(']') {
        return Err(MigrateError::Config(format!(
            "Access identifier contains ']': {:?}",
            name
        )));
    }
    Ok(format!("[{}]", name))
}
