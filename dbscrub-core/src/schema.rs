//! Schema catalog: table and column metadata from information-schema.
//!
//! Schemas are fetched once per connection at the start of a run and are
//! immutable afterwards. A table is "keyed" when exactly one of its columns
//! is named `id` and is part of the primary key; keyed tables are paginated
//! by that column and reconciled in place, keyless tables are rewritten from
//! scratch each run.

use crate::connection::{Connection, DbPool};
use crate::error::{Result, ScrubError};
use sqlx::Row;

/// Structure of one table in the current database.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    /// True iff a single column named `id` is part of the primary key.
    pub has_id: bool,
}

/// Structure of one table column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    /// Engine-native type name, lowercased for pattern matching.
    pub data_type: String,
    pub nullable: bool,
    /// True for the `id` primary-key column.
    pub is_id: bool,
    /// Declared maximum character length; 0 when not applicable.
    pub max_length: u32,
}

impl TableSchema {
    /// The pagination column, when this table has one.
    pub fn id_column(&self) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.is_id)
    }
}

impl ColumnSchema {
    /// Max length with the anonymizer's default applied when unknown.
    pub fn effective_max_length(&self) -> u32 {
        if self.max_length == 0 {
            255
        } else {
            self.max_length
        }
    }
}

/// One flat introspection result row, before folding into tables.
#[derive(Debug, Clone)]
pub(crate) struct SchemaRow {
    pub table: String,
    pub column: String,
    pub data_type: String,
    pub nullable: bool,
    pub is_primary: bool,
    pub max_length: i64,
}

const MYSQL_SCHEMA_QUERY: &str = r#"
    SELECT
        CAST(t.TABLE_NAME AS CHAR) as TABLE_NAME,
        CAST(c.COLUMN_NAME AS CHAR) as COLUMN_NAME,
        CAST(c.DATA_TYPE AS CHAR) as DATA_TYPE,
        CAST(CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END AS SIGNED) as IS_NULLABLE,
        CAST(CASE WHEN c.COLUMN_KEY = 'PRI' THEN 1 ELSE 0 END AS SIGNED) as IS_PRIMARY,
        CAST(COALESCE(c.CHARACTER_MAXIMUM_LENGTH, 0) AS SIGNED) as MAX_LENGTH
    FROM INFORMATION_SCHEMA.TABLES t
    JOIN INFORMATION_SCHEMA.COLUMNS c
        ON t.TABLE_NAME = c.TABLE_NAME AND t.TABLE_SCHEMA = c.TABLE_SCHEMA
    WHERE t.TABLE_SCHEMA = ?
    AND t.TABLE_TYPE = 'BASE TABLE'
    ORDER BY t.TABLE_NAME, c.ORDINAL_POSITION
"#;

const POSTGRES_SCHEMA_QUERY: &str = r#"
    SELECT
        t.table_name,
        c.column_name,
        c.data_type,
        (c.is_nullable = 'YES') as is_nullable,
        (pk.column_name IS NOT NULL) as is_primary,
        COALESCE(c.character_maximum_length, 0) as max_length
    FROM information_schema.tables t
    JOIN information_schema.columns c
        ON t.table_name = c.table_name AND t.table_schema = c.table_schema
    LEFT JOIN (
        SELECT tc.table_name, kcu.column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
        WHERE tc.constraint_type = 'PRIMARY KEY'
    ) pk ON t.table_name = pk.table_name
        AND c.column_name = pk.column_name
    WHERE t.table_schema = 'public'
    AND t.table_type = 'BASE TABLE'
    ORDER BY t.table_name, c.ordinal_position
"#;

impl Connection {
    /// Fetches the schema of every base table in the current database,
    /// ordered by (table name, ordinal position).
    pub async fn fetch_schemas(&self) -> Result<Vec<TableSchema>> {
        let rows = match self.pool() {
            DbPool::MySql(pool) => {
                let db_name: Option<String> = sqlx::query_scalar("SELECT DATABASE()")
                    .fetch_one(pool)
                    .await
                    .map_err(|e| {
                        ScrubError::schema_failed("failed to get current database name", e)
                    })?;
                let db_name = db_name.ok_or_else(|| {
                    ScrubError::configuration("connection URL does not select a database")
                })?;

                let raw = sqlx::query(MYSQL_SCHEMA_QUERY)
                    .bind(&db_name)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| ScrubError::schema_failed("failed to query schema", e))?;

                let mut rows = Vec::with_capacity(raw.len());
                for row in &raw {
                    rows.push(SchemaRow {
                        table: row
                            .try_get("TABLE_NAME")
                            .map_err(|e| ScrubError::schema_failed("failed to scan schema row", e))?,
                        column: row
                            .try_get("COLUMN_NAME")
                            .map_err(|e| ScrubError::schema_failed("failed to scan schema row", e))?,
                        data_type: row
                            .try_get("DATA_TYPE")
                            .map_err(|e| ScrubError::schema_failed("failed to scan schema row", e))?,
                        nullable: row
                            .try_get::<i64, _>("IS_NULLABLE")
                            .map_err(|e| ScrubError::schema_failed("failed to scan schema row", e))?
                            != 0,
                        is_primary: row
                            .try_get::<i64, _>("IS_PRIMARY")
                            .map_err(|e| ScrubError::schema_failed("failed to scan schema row", e))?
                            != 0,
                        max_length: row
                            .try_get("MAX_LENGTH")
                            .map_err(|e| ScrubError::schema_failed("failed to scan schema row", e))?,
                    });
                }
                rows
            }
            DbPool::Postgres(pool) => {
                let raw = sqlx::query(POSTGRES_SCHEMA_QUERY)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| ScrubError::schema_failed("failed to query schema", e))?;

                let mut rows = Vec::with_capacity(raw.len());
                for row in &raw {
                    rows.push(SchemaRow {
                        table: row
                            .try_get("table_name")
                            .map_err(|e| ScrubError::schema_failed("failed to scan schema row", e))?,
                        column: row
                            .try_get("column_name")
                            .map_err(|e| ScrubError::schema_failed("failed to scan schema row", e))?,
                        data_type: row
                            .try_get("data_type")
                            .map_err(|e| ScrubError::schema_failed("failed to scan schema row", e))?,
                        nullable: row
                            .try_get("is_nullable")
                            .map_err(|e| ScrubError::schema_failed("failed to scan schema row", e))?,
                        is_primary: row
                            .try_get("is_primary")
                            .map_err(|e| ScrubError::schema_failed("failed to scan schema row", e))?,
                        max_length: i64::from(
                            row.try_get::<i32, _>("max_length").map_err(|e| {
                                ScrubError::schema_failed("failed to scan schema row", e)
                            })?,
                        ),
                    });
                }
                rows
            }
        };

        Ok(fold_schema_rows(rows))
    }
}

/// Folds the flat (table, column) introspection rows into per-table schemas.
/// Input is expected ordered by (table, ordinal position).
pub(crate) fn fold_schema_rows(rows: Vec<SchemaRow>) -> Vec<TableSchema> {
    let mut schemas: Vec<TableSchema> = Vec::new();

    for row in rows {
        if schemas.last().map(|s| s.name.as_str()) != Some(row.table.as_str()) {
            schemas.push(TableSchema {
                name: row.table.clone(),
                columns: Vec::new(),
                has_id: false,
            });
        }
        let current = schemas.last_mut().expect("just pushed");

        let is_id = row.is_primary && row.column == "id";
        if is_id {
            current.has_id = true;
        }
        current.columns.push(ColumnSchema {
            name: row.column,
            data_type: row.data_type.to_lowercase(),
            nullable: row.nullable,
            is_id,
            max_length: u32::try_from(row.max_length).unwrap_or(u32::MAX),
        });
    }

    schemas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(table: &str, column: &str, data_type: &str, is_primary: bool) -> SchemaRow {
        SchemaRow {
            table: table.to_string(),
            column: column.to_string(),
            data_type: data_type.to_string(),
            nullable: false,
            is_primary,
            max_length: 0,
        }
    }

    #[test]
    fn folds_rows_into_tables_in_order() {
        let schemas = fold_schema_rows(vec![
            row("orders", "id", "bigint", true),
            row("orders", "total", "decimal", false),
            row("users", "id", "int", true),
            row("users", "email", "varchar", false),
        ]);

        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].name, "orders");
        assert_eq!(schemas[0].columns.len(), 2);
        assert_eq!(schemas[1].name, "users");
        assert_eq!(schemas[1].columns[1].name, "email");
    }

    #[test]
    fn has_id_requires_primary_key_named_id() {
        let schemas = fold_schema_rows(vec![
            row("events", "id", "bigint", false), // id but not primary
            row("posts", "uuid", "char", true),   // primary but not "id"
            row("users", "id", "bigint", true),
        ]);

        assert!(!schemas[0].has_id);
        assert!(!schemas[1].has_id);
        assert!(schemas[2].has_id);
        assert_eq!(schemas[2].id_column().map(|c| c.name.as_str()), Some("id"));
        assert!(schemas[0].id_column().is_none());
    }

    #[test]
    fn data_types_are_lowercased() {
        let schemas = fold_schema_rows(vec![row("t", "c", "VARCHAR", false)]);
        assert_eq!(schemas[0].columns[0].data_type, "varchar");
    }

    #[test]
    fn effective_max_length_defaults_to_255() {
        let col = ColumnSchema {
            name: "note".to_string(),
            data_type: "text".to_string(),
            nullable: true,
            is_id: false,
            max_length: 0,
        };
        assert_eq!(col.effective_max_length(), 255);

        let col = ColumnSchema {
            max_length: 40,
            ..col
        };
        assert_eq!(col.effective_max_length(), 40);
    }
}
