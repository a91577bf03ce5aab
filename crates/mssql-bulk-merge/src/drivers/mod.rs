//! Database driver implementations.
//!
//! - [`mssql`]: Microsoft SQL Server via Tiberius and bb8

pub mod mssql;

pub use mssql::{MssqlConnection, MssqlStore};
