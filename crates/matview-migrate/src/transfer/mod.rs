//! Batched transactional row transfer.
//!
//! Rows stream from the source relation into a parameterized INSERT on the
//! target. Every `batch_size` rows the batch is executed and committed, so a
//! failure loses at most the uncommitted batch and never leaves part of one.

use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::{ColumnDescriptor, Dialect, Row, SourceConnection, TargetConnection};
use crate::error::{MigrateError, Result};
use crate::progress::{ProgressSink, ProgressUpdate};

/// Rows per committed batch when none is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Position of an in-flight table transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCursor {
    /// Rows buffered since the last commit.
    pub rows_buffered: usize,
    /// Rows durably committed so far.
    pub rows_committed: u64,
    /// Commit cycles completed, including an empty final flush.
    pub commits: usize,
}

/// Statistics from one table transfer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferStats {
    /// Total rows written.
    pub rows: u64,

    /// Commit cycles.
    pub commits: usize,

    /// Time spent waiting on the source stream.
    #[serde(skip)]
    pub read_time: Duration,

    /// Time spent executing and committing batches.
    #[serde(skip)]
    pub write_time: Duration,
}

/// Build `INSERT INTO qualified (cols) VALUES ($1..$N)` in slice order.
pub fn build_insert(dialect: &dyn Dialect, qualified: &str, columns: &[ColumnDescriptor]) -> String {
    let cols = columns
        .iter()
        .map(|c| dialect.quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let params = (1..=columns.len())
        .map(|i| dialect.param_placeholder(i))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({}) VALUES ({})", qualified, cols, params)
}

/// Copies one relation into one provisioned table.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    batch_size: usize,
    progress: ProgressSink,
}

impl TransferEngine {
    /// Create an engine committing every `batch_size` rows.
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(MigrateError::Config("batch_size must be at least 1".into()));
        }
        Ok(Self {
            batch_size,
            progress: ProgressSink::default(),
        })
    }

    /// Report commits to `progress`.
    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Copy every row of `source_table` into `target_table`.
    ///
    /// Auto-commit is off for the duration and restored to its prior value
    /// afterwards, on error too. Batches committed before a failure stay
    /// committed; the error reports how many rows that was.
    pub async fn transfer<S, T>(
        &self,
        source: &mut S,
        target: &mut T,
        source_table: &str,
        target_table: &str,
        columns: &[ColumnDescriptor],
    ) -> Result<TransferStats>
    where
        S: SourceConnection + ?Sized,
        T: TargetConnection + ?Sized,
    {
        let prior = target.auto_commit();
        target
            .set_auto_commit(false)
            .await
            .map_err(|e| MigrateError::transfer(target_table, e, 0, 0))?;

        let mut cursor = BatchCursor::default();
        let mut stats = TransferStats::default();
        let result = self
            .copy_rows(source, target, source_table, target_table, columns, &mut cursor, &mut stats)
            .await;

        let restored = target.set_auto_commit(prior).await;

        match (result, restored) {
            (Err(e), restored) => {
                if let Err(restore_err) = restored {
                    warn!("Restoring auto-commit on {} failed: {}", target_table, restore_err);
                }
                Err(e)
            }
            (Ok(()), Err(e)) => Err(MigrateError::transfer(
                target_table,
                format!("restoring auto-commit: {}", e),
                cursor.rows_committed,
                cursor.commits,
            )),
            (Ok(()), Ok(())) => {
                stats.rows = cursor.rows_committed;
                stats.commits = cursor.commits;
                Ok(stats)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn copy_rows<S, T>(
        &self,
        source: &mut S,
        target: &mut T,
        source_table: &str,
        target_table: &str,
        columns: &[ColumnDescriptor],
        cursor: &mut BatchCursor,
        stats: &mut TransferStats,
    ) -> Result<()>
    where
        S: SourceConnection + ?Sized,
        T: TargetConnection + ?Sized,
    {
        let qualified = target.dialect().qualify(target.schema(), target_table);
        let insert_sql = build_insert(target.dialect(), &qualified, columns);
        debug!("{}", insert_sql);

        let mut stream = source
            .read_rows(source_table, columns)
            .await
            .map_err(|e| {
                MigrateError::transfer(
                    target_table,
                    format!("reading {}: {}", source_table, e),
                    cursor.rows_committed,
                    cursor.commits,
                )
            })?;

        let mut batch: Vec<Row> = Vec::with_capacity(self.batch_size);
        loop {
            let read_start = Instant::now();
            let next = stream.next().await;
            stats.read_time += read_start.elapsed();

            let Some(row) = next else { break };
            let row = row.map_err(|e| {
                MigrateError::transfer(
                    target_table,
                    format!("reading {}: {}", source_table, e),
                    cursor.rows_committed,
                    cursor.commits,
                )
            })?;

            if row.len() != columns.len() {
                return Err(MigrateError::transfer(
                    target_table,
                    format!("row has {} fields, expected {}", row.len(), columns.len()),
                    cursor.rows_committed,
                    cursor.commits,
                ));
            }

            batch.push(row);
            cursor.rows_buffered += 1;

            if batch.len() >= self.batch_size {
                self.flush(target, target_table, &insert_sql, &mut batch, cursor, stats)
                    .await?;
            }
        }

        // Final partial batch; may be empty
        self.flush(target, target_table, &insert_sql, &mut batch, cursor, stats)
            .await
    }

    async fn flush<T>(
        &self,
        target: &mut T,
        target_table: &str,
        insert_sql: &str,
        batch: &mut Vec<Row>,
        cursor: &mut BatchCursor,
        stats: &mut TransferStats,
    ) -> Result<()>
    where
        T: TargetConnection + ?Sized,
    {
        let write_start = Instant::now();
        let n = batch.len();

        if n > 0 {
            target
                .execute_batch(insert_sql, batch)
                .await
                .map_err(|e| {
                    MigrateError::transfer(target_table, e, cursor.rows_committed, cursor.commits)
                })?;
        }
        target
            .commit()
            .await
            .map_err(|e| {
                MigrateError::transfer(
                    target_table,
                    format!("commit: {}", e),
                    cursor.rows_committed,
                    cursor.commits,
                )
            })?;

        stats.write_time += write_start.elapsed();
        batch.clear();
        cursor.rows_buffered = 0;
        cursor.rows_committed += n as u64;
        cursor.commits += 1;

        if n == 0 {
            debug!("{}: final flush had no rows", target_table);
            return Ok(());
        }

        info!("Inserted {} rows into {}", cursor.rows_committed, target_table);
        self.progress
            .send(ProgressUpdate::RowsCommitted {
                table: target_table.to_string(),
                rows_committed: cursor.rows_committed,
                commits: cursor.commits,
            })
            .await;
        Ok(())
    }
}
