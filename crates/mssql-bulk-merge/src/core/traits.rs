//! Store abstractions used by the bulk merge stages.
//!
//! - [`ConnectionSource`]: hands out independent connections
//! - [`StoreConnection`]: executes one statement at a time
//!
//! The production implementation is [`crate::drivers::mssql::MssqlStore`].
//! Stages depend only on these traits, so they run unchanged against any
//! store that can execute parameterized statements.

use async_trait::async_trait;

use super::value::SqlValue;
use crate::error::Result;

/// A single open connection to the store.
///
/// Connections are not shared: each chunk worker and the orchestrator own
/// their own for as long as they need it. Dropping the connection releases it.
#[async_trait]
pub trait StoreConnection: Send {
    /// Execute a statement with positional parameters (`@P1`, `@P2`, ...)
    /// and return the number of rows the store reports as affected.
    ///
    /// Store failures are returned as [`BulkMergeError::Store`]; callers
    /// translate them into the error of their stage.
    ///
    /// [`BulkMergeError::Store`]: crate::error::BulkMergeError::Store
    async fn execute(&mut self, sql: &str, params: &[SqlValue<'_>]) -> Result<u64>;

    /// Called when a statement was abandoned mid-flight. The connection may
    /// still have an unread response and must not be reused.
    fn mark_broken(&mut self) {}
}

/// Source of independent store connections.
#[async_trait]
pub trait ConnectionSource: Send + Sync + 'static {
    type Connection: StoreConnection + 'static;

    /// Open (or check out) a connection.
    async fn open(&self) -> Result<Self::Connection>;
}
