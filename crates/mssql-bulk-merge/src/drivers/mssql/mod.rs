//! Microsoft SQL Server driver.
//!
//! - [`MssqlStore`]: pooled connection source
//! - [`MssqlConnection`]: a checked-out connection executing parameterized statements

mod params;
mod store;

pub use store::{MssqlConnection, MssqlStore, TiberiusConnectionManager};
