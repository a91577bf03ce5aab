//! Identifier validation and quoting for generated SQL Server statements.
//!
//! Table, column, and collation names cannot be bound as parameters, so the
//! staging DDL and INSERT text are assembled from declared metadata. Every
//! name is validated once when the table descriptor is built and quoted with
//! brackets whenever it is written into a statement.
//!
//! Validators return a plain message; callers wrap it in the error variant
//! that fits their stage.

/// Maximum identifier length accepted by SQL Server (`sysname`).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Marker prefix for tables that live in `tempdb`.
const TEMP_TABLE_MARKER: char = '#';

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers longer than SQL Server allows.
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Identifier cannot be empty".to_string());
    }

    if name.contains('\0') {
        return Err(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        ));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(format!(
            "SECURITY: Identifier exceeds maximum length of {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        ));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// Escapes closing brackets by doubling them. Callers validate first.
pub fn quote_mssql(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Whether a table name denotes a `tempdb` table (`#local` or `##global`).
pub fn is_temp_table(name: &str) -> bool {
    name.starts_with(TEMP_TABLE_MARKER)
}

/// Whether a table name denotes a session-local temp table (`#name`).
pub fn is_local_temp_table(name: &str) -> bool {
    is_temp_table(name) && !name.starts_with("##")
}

/// Escape a value for use inside an `N'...'` literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Validate a collation name (e.g. `Latin1_General_100_CI_AS_SC_UTF8`).
///
/// Collation names are written into DDL unquoted, so only word characters
/// are accepted.
pub fn validate_collation(collation: &str) -> Result<(), String> {
    if collation.is_empty() {
        return Err("Collation cannot be empty".to_string());
    }
    if !collation
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(format!(
            "SECURITY: Collation contains characters other than letters, digits and '_': {:?}",
            collation
        ));
    }
    Ok(())
}

/// Validate a column type definition such as `nvarchar(100)` or
/// `decimal(18, 4)`.
///
/// Type text is written into DDL verbatim, so statement separators and
/// comment markers are rejected.
pub fn validate_type_definition(definition: &str) -> Result<(), String> {
    let trimmed = definition.trim();
    if trimmed.is_empty() {
        return Err("Column type definition cannot be empty".to_string());
    }

    if trimmed.contains(';') {
        return Err(format!(
            "SECURITY: Type definition contains semicolon (possible injection): {:?}",
            definition
        ));
    }

    if trimmed.contains("--") || trimmed.contains("/*") || trimmed.contains("*/") {
        return Err(format!(
            "SECURITY: Type definition contains SQL comment markers (possible injection): {:?}",
            definition
        ));
    }

    if trimmed.contains('\0') || trimmed.contains('\'') {
        return Err(format!(
            "SECURITY: Type definition contains a quote or null byte: {:?}",
            definition
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("orders").is_ok());
        assert!(validate_identifier("##staging_orders").is_ok());
        assert!(validate_identifier("Order Lines").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let err = validate_identifier("users\0; DROP TABLE x").unwrap_err();
        assert!(err.contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_length_boundary() {
        assert!(validate_identifier(&"a".repeat(128)).is_ok());
        assert!(validate_identifier(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_quote_mssql_escapes_bracket() {
        assert_eq!(quote_mssql("users"), "[users]");
        assert_eq!(quote_mssql("table]name"), "[table]]name]");
    }

    #[test]
    fn test_quote_mssql_sql_injection_safely_quoted() {
        let quoted = quote_mssql("x]; DROP TABLE users; --");
        assert_eq!(quoted, "[x]]; DROP TABLE users; --]");
    }

    #[test]
    fn test_temp_table_detection() {
        assert!(is_temp_table("#local"));
        assert!(is_temp_table("##global"));
        assert!(!is_temp_table("permanent"));

        assert!(is_local_temp_table("#local"));
        assert!(!is_local_temp_table("##global"));
        assert!(!is_local_temp_table("permanent"));
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("o'brien"), "o''brien");
    }

    #[test]
    fn test_validate_collation() {
        assert!(validate_collation("Latin1_General_CI_AS").is_ok());
        assert!(validate_collation("SQL_Latin1_General_CP1_CS_AS").is_ok());
        assert!(validate_collation("").is_err());
        assert!(validate_collation("Latin1 NOT NULL, x int").is_err());
    }

    #[test]
    fn test_validate_type_definition() {
        assert!(validate_type_definition("nvarchar(100)").is_ok());
        assert!(validate_type_definition("decimal(18, 4)").is_ok());
        assert!(validate_type_definition("varbinary(max)").is_ok());
        assert!(validate_type_definition("  ").is_err());
        assert!(validate_type_definition("int; DROP TABLE t").is_err());
        assert!(validate_type_definition("int -- comment").is_err());
        assert!(validate_type_definition("int DEFAULT 'x'").is_err());
    }
}
