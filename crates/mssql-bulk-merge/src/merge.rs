//! Merge execution against the populated staging table.

use tracing::{debug, error};

use crate::core::traits::StoreConnection;
use crate::error::{BulkMergeError, Result};

/// Run the caller's merge statement and return the affected row count.
///
/// A missing or blank statement is a no-op returning 0. The statement is
/// executed once, without a command timeout, and the count the store reports
/// is returned unchanged.
pub async fn merge<C>(conn: &mut C, statement: Option<&str>) -> Result<u64>
where
    C: StoreConnection + ?Sized,
{
    let statement = match statement.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => {
            debug!("No merge statement supplied, skipping merge");
            return Ok(0);
        }
    };

    match conn.execute(statement, &[]).await {
        Ok(affected) => Ok(affected),
        Err(e) => {
            error!("Merge statement failed: {}", e);
            Err(BulkMergeError::Merge(e.to_string()))
        }
    }
}
