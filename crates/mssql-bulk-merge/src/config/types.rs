//! Configuration type definitions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of records per chunk (one loader task per chunk).
pub const DEFAULT_INSERTS_PER_THREAD: usize = 10_000;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target database (SQL Server) configuration.
    pub target: TargetConfig,

    /// Loader behavior configuration.
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Target database (SQL Server) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Schema for permanent staging tables (default: "dbo").
    #[serde(default = "default_dbo_schema")]
    pub schema: String,

    /// SSL mode: "disable" or anything else to require encryption (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Loader behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Records per chunk; each chunk gets its own task and connection.
    #[serde(default = "default_inserts_per_thread")]
    pub inserts_per_thread: usize,

    /// Timeout for each staging row insert, in seconds (default: 30).
    /// The merge statement never has a timeout.
    ///
    /// Enforced on the client: an expired insert is abandoned, not cancelled
    /// on the server, so it may still commit after the run reports the
    /// failure. The connection it ran on is discarded rather than returned
    /// to the pool.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Maximum open connections in the pool (default: 32).
    /// One is held by the orchestrator for the whole run.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Pool checkout timeout, in seconds (default: 300). Loader tasks only
    /// check out a connection once a loader slot is free, so queued chunks
    /// never spend this budget waiting for other chunks.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            inserts_per_thread: default_inserts_per_thread(),
            command_timeout_secs: default_command_timeout_secs(),
            max_connections: default_max_connections(),
            connection_timeout_secs: default_connection_timeout_secs(),
        }
    }
}

impl LoaderConfig {
    /// Per-row command timeout.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Pool checkout timeout.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Connections available to loader tasks at once: the pool minus the
    /// one the orchestrator holds.
    pub fn loader_connections(&self) -> usize {
        (self.max_connections as usize).saturating_sub(1).max(1)
    }
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_dbo_schema() -> String {
    "dbo".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_inserts_per_thread() -> usize {
    DEFAULT_INSERTS_PER_THREAD
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    32
}

fn default_connection_timeout_secs() -> u64 {
    300
}
