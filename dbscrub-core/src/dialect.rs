//! SQL dialect differences between the supported engines.
//!
//! The two engines share almost the entire plan; everything that differs is
//! isolated here so the reader and writer stay engine-agnostic. Adding a
//! third dialect means extending the enum and letting exhaustive matches
//! point at every site that needs a decision.

use crate::schema::{ColumnSchema, TableSchema};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Postgres => write!(f, "postgres"),
        }
    }
}

impl Dialect {
    /// Resolves a dialect from a URL scheme.
    pub fn for_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "mysql" => Some(Dialect::MySql),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            _ => None,
        }
    }

    /// Quotes an identifier. No escaping of embedded quote characters is
    /// performed; identifiers come from schema introspection and are trusted.
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name),
            Dialect::Postgres => format!("\"{}\"", name),
        }
    }

    /// Returns the placeholder for the i-th bind parameter (1-based).
    pub fn placeholder(&self, i: usize) -> String {
        match self {
            Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${}", i),
        }
    }

    /// Statement disabling referential checks for the current transaction.
    /// Must run inside the write transaction, before the write statement.
    pub fn defer_constraints_sql(&self) -> &'static str {
        match self {
            Dialect::MySql => "SET FOREIGN_KEY_CHECKS=0",
            Dialect::Postgres => "SET CONSTRAINTS ALL DEFERRED",
        }
    }

    /// Statement re-enabling referential checks, run once at clean shutdown.
    pub fn restore_constraints_sql(&self) -> &'static str {
        match self {
            Dialect::MySql => "SET FOREIGN_KEY_CHECKS=1",
            Dialect::Postgres => "SET CONSTRAINTS ALL IMMEDIATE",
        }
    }

    /// Builds an insert-or-update statement for the present columns.
    ///
    /// The update clause covers present non-ID columns. When none remain the
    /// statement degenerates to a plain `INSERT` (MySQL) or
    /// `ON CONFLICT ... DO NOTHING` (PostgreSQL).
    pub fn build_upsert(&self, schema: &TableSchema, present: &[&ColumnSchema]) -> String {
        let table = self.quote_ident(&schema.name);
        let columns = self.column_list(present);
        let placeholders = self.placeholder_list(present.len());

        match self {
            Dialect::MySql => {
                let updates: Vec<String> = present
                    .iter()
                    .filter(|c| !c.is_id)
                    .map(|c| {
                        let q = self.quote_ident(&c.name);
                        format!("{} = VALUES({})", q, q)
                    })
                    .collect();

                if updates.is_empty() {
                    format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        table, columns, placeholders
                    )
                } else {
                    format!(
                        "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
                        table,
                        columns,
                        placeholders,
                        updates.join(", ")
                    )
                }
            }
            Dialect::Postgres => {
                let conflict: Vec<String> = present
                    .iter()
                    .filter(|c| c.is_id)
                    .map(|c| self.quote_ident(&c.name))
                    .collect();
                let updates: Vec<String> = present
                    .iter()
                    .filter(|c| !c.is_id)
                    .map(|c| {
                        let q = self.quote_ident(&c.name);
                        format!("{} = EXCLUDED.{}", q, q)
                    })
                    .collect();

                if updates.is_empty() {
                    format!(
                        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
                        table,
                        columns,
                        placeholders,
                        conflict.join(", ")
                    )
                } else {
                    format!(
                        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
                        table,
                        columns,
                        placeholders,
                        conflict.join(", "),
                        updates.join(", ")
                    )
                }
            }
        }
    }

    /// Builds a plain insert statement for the present columns.
    pub fn build_insert(&self, schema: &TableSchema, present: &[&ColumnSchema]) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_ident(&schema.name),
            self.column_list(present),
            self.placeholder_list(present.len())
        )
    }

    /// Builds a range-scoped reconciliation delete.
    ///
    /// Bind order: range lower bound, range upper bound, then the `keep_len`
    /// IDs to retain. The keep-set may be smaller than the scanned range
    /// (sampling keeps only a quota of each page); with an empty keep-set
    /// the statement clears the whole range.
    pub fn build_range_delete(&self, table: &str, id_col: &str, keep_len: usize) -> String {
        let id = self.quote_ident(id_col);
        if keep_len == 0 {
            return format!(
                "DELETE FROM {} WHERE {} BETWEEN {} AND {}",
                self.quote_ident(table),
                id,
                self.placeholder(1),
                self.placeholder(2)
            );
        }
        let keeps: Vec<String> = (0..keep_len).map(|i| self.placeholder(i + 3)).collect();
        format!(
            "DELETE FROM {} WHERE {} BETWEEN {} AND {} AND {} NOT IN ({})",
            self.quote_ident(table),
            id,
            self.placeholder(1),
            self.placeholder(2),
            id,
            keeps.join(", ")
        )
    }

    fn column_list(&self, present: &[&ColumnSchema]) -> String {
        present
            .iter()
            .map(|c| self.quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn placeholder_list(&self, count: usize) -> String {
        (0..count)
            .map(|i| self.placeholder(i + 1))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
