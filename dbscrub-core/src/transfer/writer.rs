//! Destination writer pool.
//!
//! A fixed set of workers drains one bounded job queue. Submission awaits
//! queue capacity, which is the backpressure that lets the destination's
//! pace throttle the readers. Job ordering is not preserved: upserts and the
//! range delete for the same page may interleave, which is safe because the
//! delete's NOT-IN list contains every ID the page forwarded for write.
//!
//! Individual job failures are counted and logged at DEBUG; they never abort
//! the run.

use crate::anonymizer::Row;
use crate::connection::Connection;
use crate::transfer::progress::Progress;
use crate::value::SqlValue;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Queue capacity per worker, in jobs.
const QUEUE_JOBS_PER_WORKER: usize = 2000;

enum WriteJob {
    Upsert(Row),
    RangeDelete {
        table: String,
        id_col: String,
        low: SqlValue,
        high: SqlValue,
        keep: Vec<SqlValue>,
    },
}

/// The writer pool: worker tasks plus the submission side of the queue.
pub struct Writer {
    tx: mpsc::Sender<WriteJob>,
    workers: Vec<JoinHandle<()>>,
}

/// A cloneable handle readers use to submit jobs.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<WriteJob>,
}

impl Writer {
    /// Spawns `workers` tasks writing to `dest` behind a queue of
    /// `workers * 2000` jobs.
    pub fn spawn(dest: Arc<Connection>, workers: usize, progress: Arc<Progress>) -> Self {
        let (tx, rx) = mpsc::channel(workers.max(1) * QUEUE_JOBS_PER_WORKER);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|_| {
                let dest = Arc::clone(&dest);
                let rx = Arc::clone(&rx);
                let progress = Arc::clone(&progress);
                tokio::spawn(worker_loop(dest, rx, progress))
            })
            .collect();

        Self {
            tx,
            workers: handles,
        }
    }

    pub fn handle(&self) -> WriterHandle {
        WriterHandle {
            tx: self.tx.clone(),
        }
    }

    /// Closes the queue and waits for every queued job to execute.
    pub async fn drain_and_stop(self) {
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}

impl WriterHandle {
    /// Submits a row for upsert. Awaits queue capacity.
    pub async fn submit_upsert(&self, row: Row) {
        if self.tx.send(WriteJob::Upsert(row)).await.is_err() {
            tracing::warn!("writer pool already stopped; dropping row");
        }
    }

    /// Submits a range-reconciliation delete for one scanned page.
    ///
    /// [`low`, `high`] spans the whole page; `keep` is the ascending set of
    /// IDs actually forwarded from it, which sampling may shrink to a
    /// subset — or to nothing, clearing the range.
    pub async fn submit_range_delete(
        &self,
        table: String,
        id_col: String,
        low: SqlValue,
        high: SqlValue,
        keep: Vec<SqlValue>,
    ) {
        let job = WriteJob::RangeDelete {
            table,
            id_col,
            low,
            high,
            keep,
        };
        if self.tx.send(job).await.is_err() {
            tracing::warn!("writer pool already stopped; dropping delete");
        }
    }
}

async fn worker_loop(
    dest: Arc<Connection>,
    rx: Arc<Mutex<mpsc::Receiver<WriteJob>>>,
    progress: Arc<Progress>,
) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            break;
        };

        match job {
            WriteJob::Upsert(row) => match dest.upsert_row(&row.schema, &row.data).await {
                Ok(()) => progress.row_written(),
                Err(e) => {
                    progress.error();
                    tracing::debug!("error writing to table {}: {}", row.schema.name, e);
                }
            },
            WriteJob::RangeDelete {
                table,
                id_col,
                low,
                high,
                keep,
            } => match dest.delete_range(&table, &id_col, &low, &high, &keep).await {
                Ok(deleted) => progress.rows_deleted(deleted),
                Err(e) => {
                    progress.error();
                    tracing::debug!("error deleting from table {}: {}", table, e);
                }
            },
        }
    }
}
