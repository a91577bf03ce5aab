//! Error types for the bulk merge library.

use std::time::Duration;

use thiserror::Error;

/// Main error type for bulk load and merge operations.
#[derive(Error, Debug)]
pub enum BulkMergeError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record type metadata is missing or invalid, or the staging DDL failed
    #[error("Schema error for table {table}: {message}")]
    Schema { table: String, message: String },

    /// A non-nullable field carried a NULL value
    #[error(
        "Field '{field}' of table {table} is mapped as NOT NULL but the record at batch \
         index {row} has no value (non-nullable violation)"
    )]
    Validation {
        table: String,
        field: String,
        /// Zero-based index of the record in the submitted batch.
        row: usize,
    },

    /// The store rejected a staging row insert
    #[error("Insert into {table} failed: {message}\n  SQL: {sql}")]
    Insert {
        table: String,
        sql: String,
        message: String,
    },

    /// The caller-supplied merge statement failed
    #[error("Merge failed: {0}")]
    Merge(String),

    /// Store-level error reported by the driver
    #[error("Store error: {0}")]
    Store(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A command exceeded its timeout
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// A chunk worker task panicked or was aborted
    #[error("Loader task failed: {0}")]
    Task(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BulkMergeError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        BulkMergeError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Schema error
    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        BulkMergeError::Schema {
            table: table.into(),
            message: message.into(),
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

/// Result type alias for bulk merge operations.
pub type Result<T> = std::result::Result<T, BulkMergeError>;
