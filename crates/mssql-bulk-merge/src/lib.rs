//! # mssql-bulk-merge
//!
//! Parallel bulk load into a SQL Server staging table, followed by a
//! caller-supplied merge statement.
//!
//! For a record type that implements [`StagingRecord`], a run:
//!
//! - **Prepares** the staging table (drop if it exists, then create it with a
//!   surrogate identity key and one column per mapping)
//! - **Loads** the batch in fixed-size chunks, one task and one connection
//!   per chunk, validating non-nullable columns row by row
//! - **Merges** by executing the caller's statement and returning the number
//!   of affected rows
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_bulk_merge::{
//!     BulkMergeEngine, ColumnMapping, Config, MssqlStore, SqlValue, StagingRecord,
//!     TableDeclaration,
//! };
//!
//! struct Customer {
//!     code: String,
//!     name: Option<String>,
//! }
//!
//! impl StagingRecord for Customer {
//!     fn table_declaration() -> Option<TableDeclaration> {
//!         Some(TableDeclaration::new("##customer_stage"))
//!     }
//!
//!     fn column_mappings() -> Vec<ColumnMapping<Self>> {
//!         vec![
//!             ColumnMapping::new("code", "varchar(20)", |c: &Customer| SqlValue::from(&c.code)),
//!             ColumnMapping::new("name", "nvarchar(200)", |c: &Customer| {
//!                 SqlValue::from(c.name.as_deref())
//!             })
//!             .nullable(),
//!         ]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> mssql_bulk_merge::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let store = MssqlStore::from_config(&config).await?;
//!     let engine = BulkMergeEngine::<Customer, _>::new(store, &config)?;
//!
//!     let batch = vec![Customer { code: "C-1".into(), name: None }];
//!     let merged = engine
//!         .run(
//!             batch,
//!             Some(
//!                 "MERGE dbo.customers AS t USING ##customer_stage AS s ON t.code = s.code \
//!                  WHEN NOT MATCHED THEN INSERT (code, name) VALUES (s.code, s.name);",
//!             ),
//!         )
//!         .await?;
//!     println!("Merged {} rows", merged);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod staging;
pub mod transfer;

// Re-exports for convenient access
pub use config::{Config, LoaderConfig, TargetConfig, DEFAULT_INSERTS_PER_THREAD};
pub use crate::core::{
    ColumnMapping, ConnectionSource, SqlNullType, SqlValue, StagingRecord, StoreConnection,
    TableDeclaration, TableDescriptor,
};
pub use drivers::{MssqlConnection, MssqlStore};
pub use error::{BulkMergeError, Result};
pub use orchestrator::{BulkMergeEngine, RunSummary};
