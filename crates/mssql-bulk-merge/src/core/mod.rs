//! Core types shared by every stage of a bulk merge run.
//!
//! - [`schema`]: record registration and the cached table descriptor
//! - [`value`]: column values extracted from records
//! - [`identifier`]: identifier validation and quoting
//! - [`traits`]: store connection abstractions

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{
    ColumnAccessor, ColumnMapping, StagingRecord, TableDeclaration, TableDescriptor,
    SURROGATE_KEY_COLUMN,
};
pub use traits::{ConnectionSource, StoreConnection};
pub use value::{NullHint, SqlNullType, SqlValue};
