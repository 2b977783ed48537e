//! Source reader: one task per table, bounded by the worker count.
//!
//! Within a table the reader is strictly sequential; keyset pagination is
//! inherently serial. Parallelism exists only at the table boundary.

use crate::anonymizer::{self, Row};
use crate::config::ScrubConfig;
use crate::connection::Connection;
use crate::error::{Result, ScrubError};
use crate::schema::TableSchema;
use crate::transfer::progress::Progress;
use crate::transfer::writer::WriterHandle;
use crate::value::{compare_ids, SqlValue};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Rows per keyset page.
const PAGE_SIZE: usize = 1000;

pub struct Reader {
    source: Arc<Connection>,
    writer: WriterHandle,
    config: Arc<ScrubConfig>,
    progress: Arc<Progress>,
    workers: usize,
}

impl Reader {
    pub fn new(
        source: Arc<Connection>,
        writer: WriterHandle,
        config: Arc<ScrubConfig>,
        progress: Arc<Progress>,
        workers: usize,
    ) -> Self {
        Self {
            source,
            writer,
            config,
            progress,
            workers,
        }
    }

    /// Processes every table, at most `workers` concurrently. The first
    /// table-level error aborts the wait and surfaces as fatal.
    pub async fn process_tables(&self, schemas: &[Arc<TableSchema>]) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.workers.max(1)));
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        for schema in schemas {
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let writer = self.writer.clone();
            let config = Arc::clone(&self.config);
            let progress = Arc::clone(&self.progress);
            let schema = Arc::clone(schema);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("reader semaphore closed");
                progress.set_current_table(&schema.name);
                tracing::debug!("processing table {}", schema.name);

                let result = if schema.has_id {
                    process_keyed(&source, &writer, &config, &schema).await
                } else {
                    process_keyless(&source, &writer, &config, &schema).await
                };
                progress.table_done();
                result
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|e| ScrubError::setup_failed("reader task failed to complete", e))??;
        }

        Ok(())
    }
}

/// Full-scan path for tables without a usable `id` key. The destination copy
/// was truncated before the run, so plain inserts suffice. With a sample
/// percent p, every ceil(100/p)-th row (zero-indexed) is forwarded.
async fn process_keyless(
    source: &Connection,
    writer: &WriterHandle,
    config: &ScrubConfig,
    schema: &Arc<TableSchema>,
) -> Result<()> {
    let dialect = source.dialect();
    let sql = format!("SELECT * FROM {}", dialect.quote_ident(&schema.name));
    let stride = keyless_stride(config.sample_for(&schema.name));

    let rows = source.fetch_rows(&schema.name, &sql, &[]).await?;
    for (index, data) in rows.into_iter().enumerate() {
        if index % stride != 0 {
            continue;
        }
        let mut row = Row {
            schema: Arc::clone(schema),
            data,
        };
        anonymizer::anonymize(&mut row, config);
        writer.submit_upsert(row).await;
    }

    Ok(())
}

/// Keyset-paginated path for keyed tables.
///
/// Each page is read in full even when sampling, so deletion reconciliation
/// stays accurate; only the first `quota` rows of a page are forwarded for
/// write. After a page's rows are forwarded, one range-delete job is
/// submitted spanning the whole page, keeping only the forwarded IDs —
/// rows sampled out of the page are reclaimed from the destination along
/// with rows absent from the source.
async fn process_keyed(
    source: &Connection,
    writer: &WriterHandle,
    config: &ScrubConfig,
    schema: &Arc<TableSchema>,
) -> Result<()> {
    let id_col = schema
        .id_column()
        .map(|c| c.name.clone())
        .ok_or_else(|| {
            ScrubError::configuration(format!(
                "table '{}' marked keyed but has no id column",
                schema.name
            ))
        })?;

    let dialect = source.dialect();
    let table_quoted = dialect.quote_ident(&schema.name);
    let id_quoted = dialect.quote_ident(&id_col);
    let quota = keyed_page_quota(config.sample_for(&schema.name), PAGE_SIZE);

    let mut cursor: Option<SqlValue> = None;

    loop {
        let (sql, binds) = match &cursor {
            None => (
                format!(
                    "SELECT * FROM {} ORDER BY {} LIMIT {}",
                    table_quoted, id_quoted, PAGE_SIZE
                ),
                Vec::new(),
            ),
            Some(last) => (
                format!(
                    "SELECT * FROM {} WHERE {} > {} ORDER BY {} LIMIT {}",
                    table_quoted,
                    id_quoted,
                    dialect.placeholder(1),
                    id_quoted,
                    PAGE_SIZE
                ),
                vec![last.clone()],
            ),
        };

        let rows = source.fetch_rows(&schema.name, &sql, &binds).await?;
        let page_len = rows.len();
        let mut keep: Vec<SqlValue> = Vec::with_capacity(quota.min(page_len));
        let mut page_low: Option<SqlValue> = None;
        let mut page_high: Option<SqlValue> = None;
        let mut forwarded = 0usize;

        for data in rows {
            let id = data
                .get(id_col.as_str())
                .filter(|v| !v.is_null())
                .cloned()
                .ok_or_else(|| {
                    ScrubError::configuration(format!(
                        "table '{}' returned a row with a null id",
                        schema.name
                    ))
                })?;

            cursor = Some(match cursor.take() {
                None => id.clone(),
                Some(prev) => {
                    if compare_ids(&id, &prev) == Ordering::Greater {
                        id.clone()
                    } else {
                        prev
                    }
                }
            });
            if page_low.is_none() {
                page_low = Some(id.clone());
            }
            page_high = Some(id.clone());

            if forwarded < quota {
                keep.push(id);
                let mut row = Row {
                    schema: Arc::clone(schema),
                    data,
                };
                anonymizer::anonymize(&mut row, config);
                writer.submit_upsert(row).await;
                forwarded += 1;
            }
        }

        if let (Some(low), Some(high)) = (page_low, page_high) {
            writer
                .submit_range_delete(schema.name.clone(), id_col.clone(), low, high, keep)
                .await;
        }

        if page_len < PAGE_SIZE {
            break;
        }
    }

    Ok(())
}

/// Rows forwarded per keyed page under sampling: floor(page * p / 100).
fn keyed_page_quota(percent: Option<f64>, page_size: usize) -> usize {
    match percent {
        Some(p) => ((page_size as f64) * p / 100.0).floor() as usize,
        None => page_size,
    }
}

/// Forward every n-th row of a keyless scan: n = ceil(100 / p).
fn keyless_stride(percent: Option<f64>) -> usize {
    match percent {
        Some(p) => (100.0 / p).ceil().max(1.0) as usize,
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_quota_is_floor_of_page_share() {
        assert_eq!(keyed_page_quota(None, 1000), 1000);
        assert_eq!(keyed_page_quota(Some(10.0), 1000), 100);
        assert_eq!(keyed_page_quota(Some(0.1), 1000), 1);
        assert_eq!(keyed_page_quota(Some(100.0), 1000), 1000);
        assert_eq!(keyed_page_quota(Some(33.3), 1000), 333);
    }

    #[test]
    fn keyless_stride_is_ceil_of_inverse() {
        assert_eq!(keyless_stride(None), 1);
        assert_eq!(keyless_stride(Some(100.0)), 1);
        assert_eq!(keyless_stride(Some(50.0)), 2);
        assert_eq!(keyless_stride(Some(10.0)), 10);
        assert_eq!(keyless_stride(Some(3.0)), 34);
        assert_eq!(keyless_stride(Some(0.5)), 200);
    }
}
