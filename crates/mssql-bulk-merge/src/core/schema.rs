//! Record type metadata: table declarations, column mappings, and the
//! cached table descriptor.
//!
//! Rust has no runtime reflection, so a record type registers its staging
//! table and columns by implementing [`StagingRecord`]. The engine calls the
//! registration once and keeps the validated [`TableDescriptor`] for every
//! later run.
//!
//! # Example
//!
//! ```rust
//! use mssql_bulk_merge::core::{ColumnMapping, SqlValue, StagingRecord, TableDeclaration};
//!
//! struct Order {
//!     id: i64,
//!     customer: String,
//!     note: Option<String>,
//! }
//!
//! impl StagingRecord for Order {
//!     fn table_declaration() -> Option<TableDeclaration> {
//!         Some(TableDeclaration::new("##order_staging"))
//!     }
//!
//!     fn column_mappings() -> Vec<ColumnMapping<Self>> {
//!         vec![
//!             ColumnMapping::new("order_id", "bigint", |o: &Order| SqlValue::from(o.id)).field("id"),
//!             ColumnMapping::new("customer", "nvarchar(100)", |o: &Order| SqlValue::from(&o.customer))
//!                 .collate("Latin1_General_CI_AS"),
//!             ColumnMapping::new("note", "nvarchar(max)", |o: &Order| SqlValue::from(o.note.as_deref()))
//!                 .nullable(),
//!         ]
//!     }
//! }
//! ```

use std::collections::HashSet;
use std::fmt;

use super::identifier::{
    escape_literal, is_local_temp_table, is_temp_table, quote_mssql, validate_collation,
    validate_identifier, validate_type_definition,
};
use super::value::SqlValue;
use crate::error::{BulkMergeError, Result};

/// Name of the surrogate identity column added to every staging table.
pub const SURROGATE_KEY_COLUMN: &str = "id";

/// Fallback surrogate name used when a mapped column is already called `id`.
const SURROGATE_KEY_FALLBACK: &str = "_staging_id";

/// Reads one column value from a record.
pub type ColumnAccessor<R> = for<'r> fn(&'r R) -> SqlValue<'r>;

/// A record type that can be bulk loaded into a staging table.
///
/// Both functions are called once, when the engine for this type is built.
pub trait StagingRecord: Send + Sync + Sized + 'static {
    /// The staging table declaration, or `None` if the type has none.
    fn table_declaration() -> Option<TableDeclaration>;

    /// Column mappings in declaration order.
    ///
    /// The order is used verbatim for the CREATE TABLE column list and for
    /// INSERT parameter positions.
    fn column_mappings() -> Vec<ColumnMapping<Self>>;
}

/// Table-level metadata declared by a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDeclaration {
    /// Table name. A leading `##` places the table in `tempdb`.
    pub name: String,
    /// Schema for permanent tables. Falls back to the configured schema.
    pub schema: Option<String>,
    /// Whether the declaration may be used.
    pub is_valid: bool,
}

impl TableDeclaration {
    /// A valid declaration for the given table name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            is_valid: true,
        }
    }

    /// Place the table in an explicit schema.
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Mark the declaration as invalid.
    pub fn invalid(mut self) -> Self {
        self.is_valid = false;
        self
    }
}

/// Association between a record field and a staging column.
pub struct ColumnMapping<R> {
    accessor: ColumnAccessor<R>,
    field_name: String,
    column_name: String,
    sql_type: String,
    nullable: bool,
    collation: Option<String>,
}

impl<R> ColumnMapping<R> {
    /// Map a column. Columns are NOT NULL unless [`nullable`](Self::nullable)
    /// is called, and the field name defaults to the column name.
    pub fn new(
        column_name: impl Into<String>,
        sql_type: impl Into<String>,
        accessor: ColumnAccessor<R>,
    ) -> Self {
        let column_name = column_name.into();
        Self {
            accessor,
            field_name: column_name.clone(),
            column_name,
            sql_type: sql_type.into(),
            nullable: false,
            collation: None,
        }
    }

    /// Name of the record field, used in validation errors.
    pub fn field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    /// Allow NULL values in this column.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Override the column collation.
    pub fn collate(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Read this column's value from a record.
    pub fn value<'r>(&self, record: &'r R) -> SqlValue<'r> {
        (self.accessor)(record)
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn collation(&self) -> Option<&str> {
        self.collation.as_deref()
    }
}

impl<R> Clone for ColumnMapping<R> {
    fn clone(&self) -> Self {
        Self {
            accessor: self.accessor,
            field_name: self.field_name.clone(),
            column_name: self.column_name.clone(),
            sql_type: self.sql_type.clone(),
            nullable: self.nullable,
            collation: self.collation.clone(),
        }
    }
}

impl<R> fmt::Debug for ColumnMapping<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnMapping")
            .field("field_name", &self.field_name)
            .field("column_name", &self.column_name)
            .field("sql_type", &self.sql_type)
            .field("nullable", &self.nullable)
            .field("collation", &self.collation)
            .finish()
    }
}

/// Validated staging table metadata for one record type.
///
/// Read-only once built; shared by every chunk worker of a run.
pub struct TableDescriptor<R> {
    table_name: String,
    schema: String,
    columns: Vec<ColumnMapping<R>>,
    surrogate_key: &'static str,
}

impl<R: StagingRecord> TableDescriptor<R> {
    /// Build the descriptor from the record type's registration.
    pub fn from_record_type(default_schema: &str) -> Result<Self> {
        Self::new(R::table_declaration(), R::column_mappings(), default_schema)
    }
}

impl<R> TableDescriptor<R> {
    /// Validate a declaration and its column mappings.
    pub fn new(
        declaration: Option<TableDeclaration>,
        columns: Vec<ColumnMapping<R>>,
        default_schema: &str,
    ) -> Result<Self> {
        let declaration = declaration.ok_or_else(|| {
            BulkMergeError::schema("<undeclared>", "record type has no table declaration")
        })?;
        let table_name = declaration.name;

        if !declaration.is_valid {
            return Err(BulkMergeError::schema(
                &table_name,
                "table declaration is marked invalid",
            ));
        }

        validate_identifier(&table_name).map_err(|m| BulkMergeError::schema(&table_name, m))?;

        if is_local_temp_table(&table_name) {
            return Err(BulkMergeError::schema(
                &table_name,
                "session-local temp tables (single '#') are not visible to loader \
                 connections; use a global temp table ('##') or a permanent table",
            ));
        }

        let schema = declaration
            .schema
            .unwrap_or_else(|| default_schema.to_string());
        validate_identifier(&schema).map_err(|m| BulkMergeError::schema(&table_name, m))?;

        if columns.is_empty() {
            return Err(BulkMergeError::schema(
                &table_name,
                "record type declares no column mappings",
            ));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for col in &columns {
            let check = validate_identifier(col.column_name())
                .and_then(|_| validate_type_definition(col.sql_type()))
                .and_then(|_| match col.collation() {
                    Some(collation) => validate_collation(collation),
                    None => Ok(()),
                });
            if let Err(message) = check {
                return Err(BulkMergeError::schema(
                    &table_name,
                    format!("column '{}': {}", col.column_name(), message),
                ));
            }

            if !seen.insert(col.column_name().to_lowercase()) {
                return Err(BulkMergeError::schema(
                    &table_name,
                    format!("duplicate column name '{}'", col.column_name()),
                ));
            }
        }

        let surrogate_key = if !seen.contains(SURROGATE_KEY_COLUMN) {
            SURROGATE_KEY_COLUMN
        } else if !seen.contains(SURROGATE_KEY_FALLBACK) {
            SURROGATE_KEY_FALLBACK
        } else {
            return Err(BulkMergeError::schema(
                &table_name,
                format!(
                    "columns '{}' and '{}' leave no name for the identity column",
                    SURROGATE_KEY_COLUMN, SURROGATE_KEY_FALLBACK
                ),
            ));
        };

        Ok(Self {
            table_name,
            schema,
            columns,
            surrogate_key,
        })
    }

    /// The declared table name, unquoted.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Schema used for permanent tables.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Column mappings in declaration order.
    pub fn columns(&self) -> &[ColumnMapping<R>] {
        &self.columns
    }

    /// Name of the identity column placed first in the staging table.
    pub fn surrogate_key(&self) -> &str {
        self.surrogate_key
    }

    /// Whether the staging table lives in `tempdb`.
    pub fn is_temp(&self) -> bool {
        is_temp_table(&self.table_name)
    }

    /// Quoted name used in DDL and DML: `[schema].[table]` for permanent
    /// tables, `[##table]` for temp tables.
    pub fn qualified_name(&self) -> String {
        if self.is_temp() {
            quote_mssql(&self.table_name)
        } else {
            format!("{}.{}", quote_mssql(&self.schema), quote_mssql(&self.table_name))
        }
    }

    /// Name passed to `OBJECT_ID`, scoped to `tempdb` for temp tables.
    pub fn existence_check_name(&self) -> String {
        let name = if self.is_temp() {
            format!("tempdb..{}", quote_mssql(&self.table_name))
        } else {
            self.qualified_name()
        };
        escape_literal(&name)
    }
}

impl<R> fmt::Debug for TableDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDescriptor")
            .field("table_name", &self.table_name)
            .field("schema", &self.schema)
            .field("columns", &self.columns)
            .field("surrogate_key", &self.surrogate_key)
            .finish()
    }
}
