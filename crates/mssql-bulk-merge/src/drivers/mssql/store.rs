//! Pooled SQL Server connections.
//!
//! Uses Tiberius with a bb8 pool. Every loader task checks out its own
//! connection with [`MssqlStore::open`]; the pool bounds how many are open at
//! once and queues the rest.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::{LoaderConfig, TargetConfig};
use crate::core::traits::{ConnectionSource, StoreConnection};
use crate::core::value::SqlValue;
use crate::error::{BulkMergeError, Result};

/// Pool housekeeping.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const POOL_MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// A Tiberius client plus a flag that keeps it out of the pool once set.
pub struct TdsConnection {
    client: Client<Compat<TcpStream>>,
    broken: bool,
}

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: TargetConfig,
}

impl TiberiusConnectionManager {
    pub fn new(config: TargetConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.config.database);
        config.authentication(AuthMethod::sql_server(
            &self.config.user,
            &self.config.password,
        ));

        match self.config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                config.encryption(EncryptionLevel::NotSupported);
            }
            _ => {
                config.trust_cert();
                config.encryption(EncryptionLevel::Required);
            }
        }

        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = TdsConnection;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;

        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write()).await?;
        Ok(TdsConnection {
            client,
            broken: false,
        })
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.client.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.broken
    }
}

/// SQL Server connection source backed by a bb8 pool.
#[derive(Clone)]
pub struct MssqlStore {
    pool: Pool<TiberiusConnectionManager>,
}

impl MssqlStore {
    /// Create the pool and verify that the target is reachable.
    pub async fn new(target: &TargetConfig, loader: &LoaderConfig) -> Result<Self> {
        loader.validate()?;

        let manager = TiberiusConnectionManager::new(target.clone());
        let pool = Pool::builder()
            .max_size(loader.max_connections)
            .min_idle(Some(1))
            .connection_timeout(loader.connection_timeout())
            .idle_timeout(Some(POOL_IDLE_TIMEOUT))
            .max_lifetime(Some(POOL_MAX_LIFETIME))
            .test_on_check_out(true)
            .build(manager)
            .await
            .map_err(|e| BulkMergeError::pool(e, "creating MSSQL pool"))?;

        // Test connection
        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| BulkMergeError::pool(e, "testing MSSQL connection"))?;
            conn.client.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!(
            "Connected to MSSQL target: {}:{}/{} (pool_size={})",
            target.host, target.port, target.database, loader.max_connections
        );

        Ok(Self { pool })
    }

    /// Create the pool from a full configuration.
    pub async fn from_config(config: &crate::config::Config) -> Result<Self> {
        Self::new(&config.target, &config.loader).await
    }

    /// Number of connections currently open and idle.
    pub fn idle_connections(&self) -> u32 {
        self.pool.state().idle_connections
    }
}

#[async_trait]
impl ConnectionSource for MssqlStore {
    type Connection = MssqlConnection;

    async fn open(&self) -> Result<MssqlConnection> {
        let conn = self
            .pool
            .get_owned()
            .await
            .map_err(|e| BulkMergeError::pool(e, "getting MSSQL connection"))?;
        debug!("Checked out MSSQL connection");
        Ok(MssqlConnection { conn })
    }
}

/// A connection checked out of [`MssqlStore`]. Returned to the pool on drop
/// unless it was marked broken.
pub struct MssqlConnection {
    conn: PooledConnection<'static, TiberiusConnectionManager>,
}

#[async_trait]
impl StoreConnection for MssqlConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue<'_>]) -> Result<u64> {
        let params: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        let result = self.conn.client.execute(sql, &params).await?;
        Ok(result.total())
    }

    fn mark_broken(&mut self) {
        self.conn.broken = true;
    }
}
