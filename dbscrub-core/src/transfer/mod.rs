//! The transfer coordinator.
//!
//! Owns both connections and the reader/writer pools, enforces the pre-run
//! invariants (destination schema completeness, truncation of keyless
//! tables), runs the per-table work group, and restores referential checks
//! on clean shutdown.

pub mod progress;
pub mod reader;
pub mod writer;

use crate::config::ScrubConfig;
use crate::connection::Connection;
use crate::error::{Result, ScrubError};
use crate::schema::TableSchema;
use progress::Progress;
use reader::Reader;
use std::collections::HashSet;
use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;
use writer::Writer;

/// Final counters for a completed run.
#[derive(Debug, Clone)]
pub struct TransferSummary {
    pub tables: u64,
    pub rows_written: u64,
    pub rows_deleted: u64,
    pub write_errors: u64,
    pub elapsed: Duration,
}

/// Copies the source database into the destination per `config`.
///
/// Fatal errors (connect, schema fetch, missing destination table, truncate,
/// reader query, constraint restore) abort the run; per-row write failures
/// are only counted. A nonzero `write_errors` in the summary does not make
/// the run fail — callers that need to gate on partial failure can.
pub async fn run(config: ScrubConfig) -> Result<TransferSummary> {
    let workers = config.workers.max(1);
    let config = Arc::new(config);

    let source = Arc::new(
        Connection::connect(&config.source_url, workers as u32, config.verbose).await?,
    );
    let dest =
        Arc::new(Connection::connect(&config.dest_url, workers as u32, config.verbose).await?);
    tracing::info!(
        "connected to source ({}) and destination ({}) databases",
        source.dialect(),
        dest.dialect()
    );

    let source_schemas = source.fetch_schemas().await?;
    let total_columns: usize = source_schemas.iter().map(|s| s.columns.len()).sum();
    tracing::info!(
        "found {} tables with {} total columns",
        source_schemas.len(),
        total_columns
    );

    let dest_schemas = dest.fetch_schemas().await?;
    let dest_tables: HashSet<&str> = dest_schemas.iter().map(|s| s.name.as_str()).collect();
    for schema in &source_schemas {
        if !dest_tables.contains(schema.name.as_str()) {
            return Err(ScrubError::missing_table(&schema.name));
        }
    }

    // Skipped tables are exempt from everything, truncation included: their
    // destination state must come out of the run untouched.
    let schemas: Vec<Arc<TableSchema>> = source_schemas
        .into_iter()
        .filter(|s| !config.skip_tables.contains(&s.name))
        .map(Arc::new)
        .collect();

    for schema in &schemas {
        if !schema.has_id {
            tracing::info!("truncating destination table '{}' (no id key)", schema.name);
            dest.truncate_table(&schema.name).await?;
        }
    }

    let progress = Arc::new(Progress::new());
    progress.set_total_tables(schemas.len() as u64);

    let writer = Writer::spawn(Arc::clone(&dest), workers, Arc::clone(&progress));
    let reader = Reader::new(
        Arc::clone(&source),
        writer.handle(),
        Arc::clone(&config),
        Arc::clone(&progress),
        workers,
    );
    let monitor = spawn_monitor(Arc::clone(&progress));

    let run_result = reader.process_tables(&schemas).await;

    // The reader holds a queue handle; it must go away or the queue never
    // closes. Already-queued writer jobs drain even when a reader task
    // failed.
    drop(reader);
    writer.drain_and_stop().await;
    monitor.abort();
    println!();
    run_result?;

    dest.restore_constraints().await?;

    source.close().await;
    dest.close().await;

    let snapshot = progress.snapshot();
    Ok(TransferSummary {
        tables: snapshot.processed_tables,
        rows_written: snapshot.processed_rows,
        rows_deleted: snapshot.deleted_rows,
        write_errors: snapshot.error_count,
        elapsed: progress.elapsed(),
    })
}

/// Rewrites a single progress line every ~300 ms until every table is done.
fn spawn_monitor(progress: Arc<Progress>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(300));
        loop {
            interval.tick().await;
            let snap = progress.snapshot();
            if snap.total_tables > 0 && snap.processed_tables >= snap.total_tables {
                return;
            }
            print!(
                "\rProgress: {}/{} tables (current: {}, rows: {}, deleted: {}, errors: {})      ",
                snap.processed_tables,
                snap.total_tables,
                snap.current_table,
                snap.processed_rows,
                snap.deleted_rows,
                snap.error_count
            );
            let _ = std::io::stdout().flush();
        }
    })
}
