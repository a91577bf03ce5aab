//! Parallel chunk loader.
//!
//! The batch is split into consecutive chunks and every chunk is inserted by
//! its own tokio task on its own connection. Inside a chunk, rows are
//! inserted one at a time with a single parameterized INSERT text that is
//! built once and re-executed with each row's values.
//!
//! The loader waits for every task before returning. The first failure it
//! observes is returned, but tasks that are already running are left to
//! finish on their own; there is no cross-task cancellation.
//!
//! Tasks are spawned for every chunk up front. A task holds a loader slot
//! (a semaphore permit) while it has a connection open, so tasks beyond the
//! pool's capacity queue on the semaphore without a deadline instead of on
//! the pool's checkout timeout.

use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::core::identifier::quote_mssql;
use crate::core::schema::TableDescriptor;
use crate::core::traits::{ConnectionSource, StoreConnection};
use crate::core::value::SqlValue;
use crate::error::{BulkMergeError, Result};

/// A contiguous slice of the batch handled by one loader task.
///
/// Chunks share the batch allocation; only the range is per chunk.
pub struct Chunk<R> {
    rows: Arc<[R]>,
    range: Range<usize>,
    index: usize,
}

impl<R> Chunk<R> {
    /// Position of this chunk in the partition (0-based).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Batch index of the chunk's first record.
    pub fn offset(&self) -> usize {
        self.range.start
    }

    /// Records in this chunk.
    pub fn rows(&self) -> &[R] {
        &self.rows[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Split `len` records into consecutive ranges of at most `chunk_size`.
///
/// The ranges cover `0..len` exactly once, in order.
pub fn partition(len: usize, chunk_size: usize) -> Result<Vec<Range<usize>>> {
    if chunk_size == 0 {
        return Err(BulkMergeError::Config("chunk size must be at least 1".to_string()));
    }

    Ok((0..len)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(len))
        .collect())
}

/// Load every chunk of `rows` concurrently.
///
/// `on_start` is called once with the number of chunks (one task per chunk)
/// before any task is spawned. `insert` is called once per chunk and its
/// future runs on its own task. Returns the total rows inserted.
pub async fn load<R, F, Fut, S>(
    rows: Arc<[R]>,
    chunk_size: usize,
    mut insert: F,
    on_start: S,
) -> Result<u64>
where
    R: Send + Sync + 'static,
    F: FnMut(Chunk<R>) -> Fut,
    Fut: Future<Output = Result<u64>> + Send + 'static,
    S: FnOnce(usize),
{
    let ranges = partition(rows.len(), chunk_size)?;
    on_start(ranges.len());

    let mut tasks = JoinSet::new();
    for (index, range) in ranges.into_iter().enumerate() {
        let chunk = Chunk {
            rows: Arc::clone(&rows),
            range,
            index,
        };
        tasks.spawn(insert(chunk));
    }

    // Drain every task so none is aborted by dropping the set.
    let mut first_error: Option<BulkMergeError> = None;
    let mut total_rows = 0u64;
    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(result) => result,
            Err(e) => Err(BulkMergeError::Task(e.to_string())),
        };
        match outcome {
            Ok(rows) => total_rows += rows,
            Err(e) if first_error.is_none() => first_error = Some(e),
            Err(e) => debug!("Additional chunk failure after first error: {}", e),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(total_rows),
    }
}

/// Build the parameterized INSERT for a staging table.
///
/// Columns and `@P` placeholders follow the mapping order, so parameter `n`
/// is always the value of mapping `n`.
pub fn build_insert_sql<R>(descriptor: &TableDescriptor<R>) -> String {
    let columns: Vec<String> = descriptor
        .columns()
        .iter()
        .map(|c| quote_mssql(c.column_name()))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("@P{}", i)).collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        descriptor.qualified_name(),
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// Insert one chunk on a connection of its own.
///
/// The task waits for a permit from `slots` before opening its connection
/// and keeps it until the connection is released. Each row is checked for
/// NULLs in non-nullable columns and for values the store cannot represent
/// before its statement runs. The first invalid or rejected row stops the
/// chunk; rows before it stay inserted.
pub async fn insert_chunk<R, S>(
    source: Arc<S>,
    descriptor: Arc<TableDescriptor<R>>,
    chunk: Chunk<R>,
    slots: Arc<Semaphore>,
    command_timeout: Duration,
) -> Result<u64>
where
    R: Send + Sync + 'static,
    S: ConnectionSource,
{
    if chunk.is_empty() {
        return Ok(0);
    }

    let _slot = slots
        .acquire_owned()
        .await
        .map_err(|e| BulkMergeError::Task(format!("loader slots closed: {}", e)))?;

    let started = Instant::now();
    let mut conn = source.open().await?;
    let sql = build_insert_sql(&descriptor);
    let table = descriptor.qualified_name();

    let mut params: Vec<SqlValue<'_>> = Vec::with_capacity(descriptor.columns().len());
    let mut inserted = 0u64;

    for (offset, record) in chunk.rows().iter().enumerate() {
        params.clear();
        let mut unrepresentable = None;
        for col in descriptor.columns() {
            let value = col.value(record);
            if value.is_null() && !col.is_nullable() {
                return Err(BulkMergeError::Validation {
                    table: descriptor.table_name().to_string(),
                    field: col.field_name().to_string(),
                    row: chunk.offset() + offset,
                });
            }
            if let Some(reason) = value.out_of_range() {
                unrepresentable = Some(format!("column '{}': {}", col.column_name(), reason));
                break;
            }
            params.push(value);
        }

        let message = match unrepresentable {
            Some(message) => message,
            None => match tokio::time::timeout(command_timeout, conn.execute(&sql, &params)).await
            {
                Ok(Ok(_)) => {
                    inserted += 1;
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => {
                    conn.mark_broken();
                    BulkMergeError::Timeout(command_timeout).to_string()
                }
            },
        };

        error!(
            "{}: row insert failed in chunk {} at batch index {}: {}\n  SQL: {}",
            table,
            chunk.index(),
            chunk.offset() + offset,
            message,
            sql
        );
        return Err(BulkMergeError::Insert {
            table,
            sql,
            message,
        });
    }

    debug!(
        "{}: chunk {} inserted {} rows in {:?}",
        table,
        chunk.index(),
        inserted,
        started.elapsed()
    );

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnMapping, TableDeclaration};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_partition_smaller_than_chunk() {
        assert_eq!(partition(5, 10).unwrap(), vec![0..5]);
    }

    #[test]
    fn test_partition_exact_multiple() {
        assert_eq!(partition(20, 10).unwrap(), vec![0..10, 10..20]);
    }

    #[test]
    fn test_partition_with_remainder() {
        let ranges = partition(25_000, 10_000).unwrap();
        assert_eq!(ranges, vec![0..10_000, 10_000..20_000, 20_000..25_000]);
    }

    #[test]
    fn test_partition_covers_every_index_once() {
        for len in [0usize, 1, 2, 7, 99, 100, 101] {
            for size in [1usize, 3, 10, 100, 1000] {
                let ranges = partition(len, size).unwrap();
                let flattened: Vec<usize> = ranges.iter().cloned().flatten().collect();
                assert_eq!(flattened, (0..len).collect::<Vec<_>>(), "len={len} size={size}");
                assert!(ranges.iter().all(|r| r.len() <= size && !r.is_empty()));
            }
        }
    }

    #[test]
    fn test_partition_rejects_zero_chunk_size() {
        assert!(matches!(partition(10, 0), Err(BulkMergeError::Config(_))));
    }

    struct Pair {
        left: i32,
        right: Option<String>,
    }

    fn pair_descriptor(name: &str) -> TableDescriptor<Pair> {
        TableDescriptor::new(
            Some(TableDeclaration::new(name)),
            vec![
                ColumnMapping::new("left", "int", |p: &Pair| SqlValue::from(p.left)),
                ColumnMapping::new("right", "nvarchar(10)", |p: &Pair| {
                    SqlValue::from(p.right.as_deref())
                })
                .nullable(),
            ],
            "dbo",
        )
        .unwrap()
    }

    #[test]
    fn test_build_insert_sql_permanent() {
        assert_eq!(
            build_insert_sql(&pair_descriptor("pairs")),
            "INSERT INTO [dbo].[pairs] ([left], [right]) VALUES (@P1, @P2)"
        );
    }

    #[test]
    fn test_build_insert_sql_temp() {
        assert_eq!(
            build_insert_sql(&pair_descriptor("##pairs")),
            "INSERT INTO [##pairs] ([left], [right]) VALUES (@P1, @P2)"
        );
    }

    #[tokio::test]
    async fn test_load_calls_on_start_once_before_inserts() {
        let rows: Arc<[u32]> = (0..25u32).collect::<Vec<_>>().into();
        let started = Arc::new(AtomicUsize::new(0));
        let mut reported = Vec::new();

        let started_in_insert = Arc::clone(&started);
        let total = load(
            rows,
            10,
            move |chunk: Chunk<u32>| {
                let started = Arc::clone(&started_in_insert);
                async move {
                    assert_eq!(started.load(Ordering::SeqCst), 1);
                    Ok(chunk.len() as u64)
                }
            },
            |threads| {
                started.fetch_add(1, Ordering::SeqCst);
                reported.push(threads);
            },
        )
        .await
        .unwrap();

        assert_eq!(total, 25);
        assert_eq!(reported, vec![3]);
    }

    #[tokio::test]
    async fn test_load_chunks_cover_batch() {
        let rows: Arc<[u32]> = (0..1_003u32).collect::<Vec<_>>().into();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        load(
            rows,
            100,
            move |chunk: Chunk<u32>| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().extend_from_slice(chunk.rows());
                    Ok(chunk.len() as u64)
                }
            },
            |_| {},
        )
        .await
        .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..1_003u32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_load_waits_for_all_tasks_and_returns_first_error() {
        let rows: Arc<[u32]> = (0..40u32).collect::<Vec<_>>().into();
        let finished = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&finished);
        let err = load(
            rows,
            10,
            move |chunk: Chunk<u32>| {
                let counter = Arc::clone(&counter);
                async move {
                    if chunk.index() == 0 {
                        return Err(BulkMergeError::Merge("chunk zero failed".to_string()));
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(chunk.len() as u64)
                }
            },
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("chunk zero failed"));
        // The other three chunks ran to completion.
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_load_reports_panicked_task() {
        let rows: Arc<[u32]> = vec![1u32, 2, 3].into();
        let err = load(
            rows,
            2,
            |chunk: Chunk<u32>| async move {
                if chunk.index() == 1 {
                    panic!("worker blew up");
                }
                Ok(chunk.len() as u64)
            },
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BulkMergeError::Task(_)));
    }
}
