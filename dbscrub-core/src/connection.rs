//! Connection management and row-level database operations.
//!
//! A [`Connection`] owns one sqlx pool and the [`Dialect`] it speaks. Values
//! round-trip through [`SqlValue`] with a try-get cascade on read and a
//! variant match on write, so the engine stays out of the reader and writer
//! code entirely.

use crate::dialect::Dialect;
use crate::error::{redact_database_url, Result, ScrubError};
use crate::schema::{ColumnSchema, TableSchema};
use crate::value::{RowData, SqlValue};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue, Uuid};
use sqlx::{Column, Row};

type MySqlQuery<'q> = sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>;
type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

/// The engine-specific pool behind a connection.
pub(crate) enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
}

/// A pooled connection to one database, tagged with its dialect.
pub struct Connection {
    pool: DbPool,
    dialect: Dialect,
    verbose: bool,
}

impl Connection {
    /// Opens a connection pool for the given database URL.
    ///
    /// The URL scheme selects the dialect (`mysql`, `postgres`,
    /// `postgresql`); the pool is capped at `max_connections`.
    pub async fn connect(url: &str, max_connections: u32, verbose: bool) -> Result<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| ScrubError::configuration(format!("invalid database URL: {}", e)))?;
        let dialect = Dialect::for_scheme(parsed.scheme()).ok_or_else(|| {
            ScrubError::configuration(format!(
                "unsupported database scheme: {}",
                parsed.scheme()
            ))
        })?;

        tracing::info!(
            "connecting to {} database at {}",
            dialect,
            redact_database_url(url)
        );

        let pool = match dialect {
            Dialect::MySql => DbPool::MySql(
                MySqlPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await
                    .map_err(|e| {
                        ScrubError::setup_failed(
                            format!(
                                "failed to connect to {}",
                                redact_database_url(url)
                            ),
                            e,
                        )
                    })?,
            ),
            Dialect::Postgres => DbPool::Postgres(
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await
                    .map_err(|e| {
                        ScrubError::setup_failed(
                            format!(
                                "failed to connect to {}",
                                redact_database_url(url)
                            ),
                            e,
                        )
                    })?,
            ),
        };

        Ok(Self {
            pool,
            dialect,
            verbose,
        })
    }

    /// The dialect this connection speaks.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Closes the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        match &self.pool {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
        }
    }

    fn echo(&self, sql: &str) {
        if self.verbose {
            println!("Executing SQL: {}", sql);
        }
    }

    /// Runs a SELECT against `table` and decodes every row into the opaque
    /// value carrier. `binds` are cursor parameters, in placeholder order.
    pub async fn fetch_rows(
        &self,
        table: &str,
        sql: &str,
        binds: &[SqlValue],
    ) -> Result<Vec<RowData>> {
        self.echo(sql);
        match &self.pool {
            DbPool::MySql(pool) => {
                let mut query = sqlx::query(sql);
                for value in binds {
                    query = bind_mysql(query, value, None);
                }
                let rows = query
                    .fetch_all(pool)
                    .await
                    .map_err(|e| ScrubError::read_failed(table, e))?;
                Ok(rows.iter().map(decode_mysql_row).collect())
            }
            DbPool::Postgres(pool) => {
                let mut query = sqlx::query(sql);
                for value in binds {
                    query = bind_pg(query, value, None);
                }
                let rows = query
                    .fetch_all(pool)
                    .await
                    .map_err(|e| ScrubError::read_failed(table, e))?;
                Ok(rows.iter().map(decode_pg_row).collect())
            }
        }
    }

    /// Inserts or updates one row in the destination.
    ///
    /// Keyed tables get a dialect-specific UPSERT; keyless tables a plain
    /// insert. Either statement runs in its own transaction with referential
    /// checks deferred first.
    pub async fn upsert_row(&self, schema: &TableSchema, data: &RowData) -> Result<()> {
        let present: Vec<&ColumnSchema> = schema
            .columns
            .iter()
            .filter(|c| data.contains_key(&c.name))
            .collect();
        if present.is_empty() {
            return Ok(());
        }

        let sql = if schema.has_id {
            self.dialect.build_upsert(schema, &present)
        } else {
            self.dialect.build_insert(schema, &present)
        };
        self.echo(&sql);

        let context = || format!("failed to write row to table '{}'", schema.name);

        match &self.pool {
            DbPool::MySql(pool) => {
                let mut tx = pool
                    .begin()
                    .await
                    .map_err(|e| ScrubError::write_failed(context(), e))?;
                sqlx::query(self.dialect.defer_constraints_sql())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| ScrubError::write_failed(context(), e))?;

                let mut query = sqlx::query(&sql);
                for column in &present {
                    let value = &data[&column.name];
                    query = bind_mysql(query, value, Some(column));
                }
                query
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| ScrubError::write_failed(context(), e))?;
                tx.commit()
                    .await
                    .map_err(|e| ScrubError::write_failed(context(), e))?;
            }
            DbPool::Postgres(pool) => {
                let mut tx = pool
                    .begin()
                    .await
                    .map_err(|e| ScrubError::write_failed(context(), e))?;
                sqlx::query(self.dialect.defer_constraints_sql())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| ScrubError::write_failed(context(), e))?;

                let mut query = sqlx::query(&sql);
                for column in &present {
                    let value = &data[&column.name];
                    query = bind_pg(query, value, Some(column));
                }
                query
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| ScrubError::write_failed(context(), e))?;
                tx.commit()
                    .await
                    .map_err(|e| ScrubError::write_failed(context(), e))?;
            }
        }

        Ok(())
    }

    /// Deletes destination rows whose ID falls in [`low`, `high`] but is not
    /// in the keep-set. Returns the affected-row count.
    ///
    /// The bounds span one scanned page; `keep` holds the IDs forwarded from
    /// that page, ascending, and may be a strict subset of the page (or
    /// empty) when sampling. Runs outside any explicit transaction.
    pub async fn delete_range(
        &self,
        table: &str,
        id_col: &str,
        low: &SqlValue,
        high: &SqlValue,
        keep: &[SqlValue],
    ) -> Result<u64> {
        let sql = self.dialect.build_range_delete(table, id_col, keep.len());
        self.echo(&sql);

        let context = || format!("failed to delete from table '{}'", table);

        let affected = match &self.pool {
            DbPool::MySql(pool) => {
                let mut query = sqlx::query(&sql);
                query = bind_mysql(query, low, None);
                query = bind_mysql(query, high, None);
                for id in keep {
                    query = bind_mysql(query, id, None);
                }
                query
                    .execute(pool)
                    .await
                    .map_err(|e| ScrubError::write_failed(context(), e))?
                    .rows_affected()
            }
            DbPool::Postgres(pool) => {
                let mut query = sqlx::query(&sql);
                query = bind_pg(query, low, None);
                query = bind_pg(query, high, None);
                for id in keep {
                    query = bind_pg(query, id, None);
                }
                query
                    .execute(pool)
                    .await
                    .map_err(|e| ScrubError::write_failed(context(), e))?
                    .rows_affected()
            }
        };

        Ok(affected)
    }

    /// Empties a destination table. Keyless tables are rewritten from
    /// scratch each run, so this runs before their reload.
    pub async fn truncate_table(&self, table: &str) -> Result<()> {
        let sql = format!("TRUNCATE TABLE {}", self.dialect.quote_ident(table));
        self.echo(&sql);
        self.execute_simple(&sql)
            .await
            .map_err(|e| ScrubError::setup_failed(format!("failed to truncate table '{}'", table), e))
    }

    /// Re-enables referential checks. Run once by the coordinator at clean
    /// shutdown.
    pub async fn restore_constraints(&self) -> Result<()> {
        let sql = self.dialect.restore_constraints_sql();
        self.echo(sql);
        self.execute_simple(sql)
            .await
            .map_err(|e| ScrubError::setup_failed("failed to re-enable constraint checks", e))
    }

    async fn execute_simple(&self, sql: &str) -> std::result::Result<(), sqlx::Error> {
        match &self.pool {
            DbPool::MySql(pool) => {
                sqlx::query(sql).execute(pool).await?;
            }
            DbPool::Postgres(pool) => {
                sqlx::query(sql).execute(pool).await?;
            }
        }
        Ok(())
    }
}

fn decode_mysql_row(row: &MySqlRow) -> RowData {
    let mut data = RowData::with_capacity(row.columns().len());
    for column in row.columns() {
        data.insert(
            column.name().to_string(),
            decode_mysql_value(row, column.ordinal()),
        );
    }
    data
}

/// Decodes one MySQL column by trying driver types in order of likelihood.
/// Anything the cascade cannot express becomes `Null`.
fn decode_mysql_value(row: &MySqlRow, idx: usize) -> SqlValue {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(SqlValue::Int).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return v.map(SqlValue::Uint).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(SqlValue::Float).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v.map(|f| SqlValue::Float(f64::from(f))).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Decimal>, _>(idx) {
        return v.map(SqlValue::Decimal).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return v.map(SqlValue::DateTime).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
        return v.map(SqlValue::TimestampTz).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
        return v.map(SqlValue::Date).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(idx) {
        return v.map(SqlValue::Time).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<JsonValue>, _>(idx) {
        return v.map(SqlValue::Json).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(SqlValue::Text).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(SqlValue::Bytes).unwrap_or(SqlValue::Null);
    }
    SqlValue::Null
}

fn decode_pg_row(row: &PgRow) -> RowData {
    let mut data = RowData::with_capacity(row.columns().len());
    for column in row.columns() {
        data.insert(
            column.name().to_string(),
            decode_pg_value(row, column.ordinal()),
        );
    }
    data
}

/// Decodes one PostgreSQL column. The driver is strict about integer widths,
/// so every width is tried separately.
fn decode_pg_value(row: &PgRow, idx: usize) -> SqlValue {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(SqlValue::Int).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(|i| SqlValue::Int(i64::from(i))).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return v.map(|i| SqlValue::Int(i64::from(i))).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(SqlValue::Float).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v.map(|f| SqlValue::Float(f64::from(f))).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Decimal>, _>(idx) {
        return v.map(SqlValue::Decimal).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(SqlValue::Bool).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return v.map(SqlValue::DateTime).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
        return v.map(SqlValue::TimestampTz).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
        return v.map(SqlValue::Date).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(idx) {
        return v.map(SqlValue::Time).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Uuid>, _>(idx) {
        return v.map(SqlValue::Uuid).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<JsonValue>, _>(idx) {
        return v.map(SqlValue::Json).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(SqlValue::Text).unwrap_or(SqlValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(SqlValue::Bytes).unwrap_or(SqlValue::Null);
    }
    SqlValue::Null
}

fn bind_mysql<'q>(
    query: MySqlQuery<'q>,
    value: &SqlValue,
    column: Option<&ColumnSchema>,
) -> MySqlQuery<'q> {
    match value {
        SqlValue::Null => bind_null_mysql(query, column),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Uint(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bytes(v) => query.bind(v.clone()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::TimestampTz(v) => query.bind(*v),
        // MySQL has no native uuid type; send the canonical text form.
        SqlValue::Uuid(v) => query.bind(v.to_string()),
        SqlValue::Json(v) => query.bind(v.clone()),
    }
}

fn bind_pg<'q>(
    query: PgQuery<'q>,
    value: &SqlValue,
    column: Option<&ColumnSchema>,
) -> PgQuery<'q> {
    match value {
        SqlValue::Null => bind_null_pg(query, column),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        // PostgreSQL has no unsigned integer types.
        SqlValue::Uint(v) => query.bind(*v as i64),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bytes(v) => query.bind(v.clone()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::TimestampTz(v) => query.bind(*v),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Json(v) => query.bind(v.clone()),
    }
}

/// Picks the parameter type for a NULL bind from the column's declared type.
/// PostgreSQL infers parameter types from the bind, so an untyped NULL
/// against a non-text column would be rejected.
fn null_class(column: Option<&ColumnSchema>) -> NullClass {
    let Some(column) = column else {
        return NullClass::Text;
    };
    let ty = column.data_type.as_str();
    if ty.contains("int") {
        NullClass::Int
    } else if ty.contains("double") || ty.contains("real") || ty.contains("float") {
        NullClass::Float
    } else if ty.contains("numeric") || ty.contains("decimal") {
        NullClass::Decimal
    } else if ty.contains("bool") {
        NullClass::Bool
    } else if ty.contains("timestamp with time zone") || ty.contains("timestamptz") {
        NullClass::TimestampTz
    } else if ty.contains("timestamp") || ty.contains("datetime") {
        NullClass::DateTime
    } else if ty == "date" {
        NullClass::Date
    } else if ty.contains("time") {
        NullClass::Time
    } else if ty.contains("uuid") {
        NullClass::Uuid
    } else if ty.contains("json") {
        NullClass::Json
    } else if ty.contains("bytea") || ty.contains("blob") || ty.contains("binary") {
        NullClass::Bytes
    } else {
        NullClass::Text
    }
}

enum NullClass {
    Bool,
    Int,
    Float,
    Decimal,
    Text,
    Bytes,
    Date,
    Time,
    DateTime,
    TimestampTz,
    Uuid,
    Json,
}

fn bind_null_mysql<'q>(query: MySqlQuery<'q>, column: Option<&ColumnSchema>) -> MySqlQuery<'q> {
    match null_class(column) {
        NullClass::Bool => query.bind(None::<bool>),
        NullClass::Int => query.bind(None::<i64>),
        NullClass::Float => query.bind(None::<f64>),
        NullClass::Decimal => query.bind(None::<Decimal>),
        NullClass::Text => query.bind(None::<String>),
        NullClass::Bytes => query.bind(None::<Vec<u8>>),
        NullClass::Date => query.bind(None::<NaiveDate>),
        NullClass::Time => query.bind(None::<NaiveTime>),
        NullClass::DateTime => query.bind(None::<NaiveDateTime>),
        NullClass::TimestampTz => query.bind(None::<DateTime<Utc>>),
        NullClass::Uuid => query.bind(None::<String>),
        NullClass::Json => query.bind(None::<JsonValue>),
    }
}

fn bind_null_pg<'q>(query: PgQuery<'q>, column: Option<&ColumnSchema>) -> PgQuery<'q> {
    match null_class(column) {
        NullClass::Bool => query.bind(None::<bool>),
        NullClass::Int => query.bind(None::<i64>),
        NullClass::Float => query.bind(None::<f64>),
        NullClass::Decimal => query.bind(None::<Decimal>),
        NullClass::Text => query.bind(None::<String>),
        NullClass::Bytes => query.bind(None::<Vec<u8>>),
        NullClass::Date => query.bind(None::<NaiveDate>),
        NullClass::Time => query.bind(None::<NaiveTime>),
        NullClass::DateTime => query.bind(None::<NaiveDateTime>),
        NullClass::TimestampTz => query.bind(None::<DateTime<Utc>>),
        NullClass::Uuid => query.bind(None::<Uuid>),
        NullClass::Json => query.bind(None::<JsonValue>),
    }
}
