//! Per-run progress counters.
//!
//! All counters are 64-bit atomics and monotonically non-decreasing for the
//! duration of a run. `current_table` is advisory, display-only state: the
//! last writer wins and readers must tolerate staleness.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

#[derive(Debug)]
pub struct Progress {
    total_tables: AtomicU64,
    processed_tables: AtomicU64,
    processed_rows: AtomicU64,
    deleted_rows: AtomicU64,
    error_count: AtomicU64,
    current_table: RwLock<String>,
    started_at: Instant,
}

/// A point-in-time copy of the counters for display.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub total_tables: u64,
    pub processed_tables: u64,
    pub processed_rows: u64,
    pub deleted_rows: u64,
    pub error_count: u64,
    pub current_table: String,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            total_tables: AtomicU64::new(0),
            processed_tables: AtomicU64::new(0),
            processed_rows: AtomicU64::new(0),
            deleted_rows: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            current_table: RwLock::new(String::new()),
            started_at: Instant::now(),
        }
    }

    pub fn set_total_tables(&self, total: u64) {
        self.total_tables.store(total, Ordering::Relaxed);
    }

    pub fn table_done(&self) {
        self.processed_tables.fetch_add(1, Ordering::Relaxed);
    }

    pub fn row_written(&self) {
        self.processed_rows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rows_deleted(&self, count: u64) {
        self.deleted_rows.fetch_add(count, Ordering::Relaxed);
    }

    pub fn error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_current_table(&self, table: &str) {
        if let Ok(mut current) = self.current_table.write() {
            current.clear();
            current.push_str(table);
        }
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total_tables: self.total_tables.load(Ordering::Relaxed),
            processed_tables: self.processed_tables.load(Ordering::Relaxed),
            processed_rows: self.processed_rows.load(Ordering::Relaxed),
            deleted_rows: self.deleted_rows.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            current_table: self
                .current_table
                .read()
                .map(|s| s.clone())
                .unwrap_or_default(),
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let progress = Progress::new();
        progress.set_total_tables(3);
        progress.table_done();
        progress.row_written();
        progress.row_written();
        progress.rows_deleted(5);
        progress.error();
        progress.set_current_table("users");

        let snap = progress.snapshot();
        assert_eq!(snap.total_tables, 3);
        assert_eq!(snap.processed_tables, 1);
        assert_eq!(snap.processed_rows, 2);
        assert_eq!(snap.deleted_rows, 5);
        assert_eq!(snap.error_count, 1);
        assert_eq!(snap.current_table, "users");
    }

    #[test]
    fn current_table_last_writer_wins() {
        let progress = Progress::new();
        progress.set_current_table("a");
        progress.set_current_table("b");
        assert_eq!(progress.snapshot().current_table, "b");
    }
}
