//! Bulk merge orchestrator - the public entry point.
//!
//! One [`BulkMergeEngine`] serves one record type. It validates the type's
//! staging metadata once at construction, then every run goes through the
//! same stages: prepare the staging table, load the batch in parallel, run
//! the merge statement.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::{Config, LoaderConfig};
use crate::core::schema::{StagingRecord, TableDescriptor};
use crate::core::traits::ConnectionSource;
use crate::error::{BulkMergeError, Result};
use crate::merge::merge;
use crate::staging::prepare;
use crate::transfer::{insert_chunk, load};

/// Loads batches of `R` into a staging table and merges them.
pub struct BulkMergeEngine<R, S> {
    source: Arc<S>,
    descriptor: Arc<TableDescriptor<R>>,
    loader: LoaderConfig,
    loader_slots: Arc<Semaphore>,
}

/// Outcome of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier, also used in log lines.
    pub run_id: String,

    /// Staging table the batch was loaded into.
    pub staging_table: String,

    /// Records submitted.
    pub records: usize,

    /// Chunks (and loader tasks) used.
    pub chunks: usize,

    /// Rows inserted into the staging table.
    pub rows_staged: u64,

    /// Rows the merge statement reported as affected.
    pub rows_merged: u64,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Staging throughput (rows/second).
    pub rows_per_second: i64,
}

impl<R, S> BulkMergeEngine<R, S>
where
    R: StagingRecord,
    S: ConnectionSource,
{
    /// Create an engine using the target schema and loader settings of `config`.
    ///
    /// Fails with a schema error, before touching the store, if `R` does not
    /// declare a usable staging table.
    pub fn new(source: S, config: &Config) -> Result<Self> {
        Self::with_loader(source, config.loader.clone(), &config.target.schema)
    }

    /// Create an engine from loader settings and the schema used for
    /// permanent staging tables.
    ///
    /// At most `max_connections - 1` loader tasks hold a connection at once;
    /// the remaining connection is the orchestrator's.
    pub fn with_loader(source: S, loader: LoaderConfig, default_schema: &str) -> Result<Self> {
        loader.validate()?;
        let descriptor = TableDescriptor::<R>::from_record_type(default_schema)?;
        debug!(
            "Registered staging table {} with {} columns",
            descriptor.qualified_name(),
            descriptor.columns().len()
        );

        Ok(Self {
            source: Arc::new(source),
            descriptor: Arc::new(descriptor),
            loader_slots: Arc::new(Semaphore::new(loader.loader_connections())),
            loader,
        })
    }

    /// The validated staging table metadata for `R`.
    pub fn descriptor(&self) -> &TableDescriptor<R> {
        &self.descriptor
    }

    /// Load `batch` and run `merge_statement`, returning the merge's affected
    /// row count. An empty batch returns 0 without touching the store.
    pub async fn run(&self, batch: Vec<R>, merge_statement: Option<&str>) -> Result<u64> {
        self.run_with_chunk_size(batch, self.loader.inserts_per_thread, merge_statement)
            .await
    }

    /// Like [`run`](Self::run) with an explicit records-per-chunk value.
    pub async fn run_with_chunk_size(
        &self,
        batch: Vec<R>,
        chunk_size: usize,
        merge_statement: Option<&str>,
    ) -> Result<u64> {
        Ok(self
            .run_detailed(batch, chunk_size, merge_statement)
            .await?
            .rows_merged)
    }

    /// Run all stages and report counts and timings.
    ///
    /// Any failure stops the run at the failing stage. The staging table is
    /// never rolled back; rows loaded by other chunks stay in place.
    pub async fn run_detailed(
        &self,
        batch: Vec<R>,
        chunk_size: usize,
        merge_statement: Option<&str>,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let staging_table = self.descriptor.qualified_name();

        if batch.is_empty() {
            debug!("Run {}: empty batch, nothing to load", run_id);
            return Ok(RunSummary {
                run_id,
                staging_table,
                records: 0,
                chunks: 0,
                rows_staged: 0,
                rows_merged: 0,
                started_at,
                duration_seconds: 0.0,
                rows_per_second: 0,
            });
        }

        if chunk_size == 0 {
            return Err(BulkMergeError::Config("records per chunk must be at least 1".to_string()));
        }

        let start = Instant::now();
        let records = batch.len();
        let rows: Arc<[R]> = batch.into();

        // Held for table lifecycle and merge, never handed to loader tasks.
        let mut conn = self.source.open().await?;

        let prepare_start = Instant::now();
        prepare(&mut conn, self.descriptor()).await?;
        debug!(
            "Run {}: prepared {} in {:?}",
            run_id,
            staging_table,
            prepare_start.elapsed()
        );

        let load_start = Instant::now();
        let mut chunks = 0usize;
        let command_timeout = self.loader.command_timeout();
        let rows_staged = load(
            rows,
            chunk_size,
            |chunk| {
                insert_chunk(
                    Arc::clone(&self.source),
                    Arc::clone(&self.descriptor),
                    chunk,
                    Arc::clone(&self.loader_slots),
                    command_timeout,
                )
            },
            |threads| {
                chunks = threads;
                info!(
                    "Inserting {} records into {} across {} threads",
                    records, staging_table, threads
                );
            },
        )
        .await?;
        let load_elapsed = load_start.elapsed();
        let rows_per_second = if load_elapsed.as_secs_f64() > 0.0 {
            (rows_staged as f64 / load_elapsed.as_secs_f64()) as i64
        } else {
            rows_staged as i64
        };
        info!(
            "{}: inserted {} rows in {:?} ({} rows/sec)",
            staging_table, rows_staged, load_elapsed, rows_per_second
        );

        let merge_start = Instant::now();
        let rows_merged = merge(&mut conn, merge_statement).await?;
        debug!(
            "Run {}: merge affected {} rows in {:?}",
            run_id,
            rows_merged,
            merge_start.elapsed()
        );

        let summary = RunSummary {
            run_id,
            staging_table,
            records,
            chunks,
            rows_staged,
            rows_merged,
            started_at,
            duration_seconds: start.elapsed().as_secs_f64(),
            rows_per_second,
        };

        info!(
            "Run {} complete: {} staged, {} merged in {:.1}s",
            summary.run_id, summary.rows_staged, summary.rows_merged, summary.duration_seconds
        );

        Ok(summary)
    }
}
