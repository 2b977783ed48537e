//! Per-row anonymization transform.
//!
//! Pure in the sense that it touches nothing but the row handed to it:
//! configured columns are replaced in place with type-appropriate synthetic
//! values, everything else is left alone. Output is intentionally not
//! deterministic; every call takes a fresh random draw.

pub mod faker;

use crate::config::ScrubConfig;
use crate::schema::{ColumnSchema, TableSchema};
use crate::value::{RowData, SqlValue};
use rand::Rng;
use std::sync::Arc;

/// A single row of data with the schema it was read under.
#[derive(Debug, Clone)]
pub struct Row {
    pub schema: Arc<TableSchema>,
    pub data: RowData,
}

/// Replaces configured column values with synthetic ones, in place.
///
/// Values marking semantic absence are preserved: NULL, strings whose
/// trimmed form is empty, and numerically-zero integer, unsigned, or
/// floating values. Legacy schemas lean on these as "not set" markers.
pub fn anonymize(row: &mut Row, config: &ScrubConfig) {
    let Some(fields) = config.fields_for(&row.schema.name) else {
        return;
    };

    let mut rng = rand::thread_rng();

    for column in &row.schema.columns {
        if !fields.contains(&column.name) {
            continue;
        }
        let Some(value) = row.data.get(&column.name) else {
            continue;
        };
        if value.is_absent() {
            continue;
        }

        let replacement = replacement_for(column, &mut rng);
        row.data.insert(column.name.clone(), replacement);
    }
}

/// Picks a replacement by the first matching rule: integer types, then
/// other numeric types, then name-based text rules, then a length-fitted
/// fallback string.
fn replacement_for(column: &ColumnSchema, rng: &mut impl Rng) -> SqlValue {
    let ty = column.data_type.as_str();

    if ty.contains("int") {
        // Stay inside 32-bit range so the value fits every integer width.
        return SqlValue::Int(rng.gen_range(1..=i64::from(i32::MAX)));
    }
    if ["float", "double", "real", "numeric", "decimal"]
        .iter()
        .any(|t| ty.contains(t))
    {
        return SqlValue::Float(rng.gen_range(0.01..1_000_000.0));
    }

    let max_length = column.effective_max_length() as usize;
    let name = column.name.to_lowercase();

    let text = if name.contains("email") {
        faker::email(rng)
    } else if name.contains("phone") {
        faker::phone(rng)
    } else if name.contains("name") {
        faker::person_name(rng)
    } else if max_length >= 50 {
        faker::sentence(rng)
    } else {
        faker::letters(rng, max_length)
    };

    SqlValue::Text(truncate(text, max_length))
}

fn truncate(s: String, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<TableSchema> {
        Arc::new(TableSchema {
            name: "users".to_string(),
            has_id: true,
            columns: vec![
                ColumnSchema {
                    name: "id".to_string(),
                    data_type: "int".to_string(),
                    nullable: false,
                    is_id: true,
                    max_length: 0,
                },
                ColumnSchema {
                    name: "email".to_string(),
                    data_type: "varchar".to_string(),
                    nullable: true,
                    is_id: false,
                    max_length: 100,
                },
                ColumnSchema {
                    name: "full_name".to_string(),
                    data_type: "varchar".to_string(),
                    nullable: true,
                    is_id: false,
                    max_length: 50,
                },
                ColumnSchema {
                    name: "balance".to_string(),
                    data_type: "decimal".to_string(),
                    nullable: false,
                    is_id: false,
                    max_length: 0,
                },
                ColumnSchema {
                    name: "note".to_string(),
                    data_type: "varchar".to_string(),
                    nullable: true,
                    is_id: false,
                    max_length: 10,
                },
            ],
        })
    }

    fn config_with(table: &str, fields: &[&str]) -> ScrubConfig {
        let mut cfg = ScrubConfig::new("mysql://s@h/src", "mysql://d@h/dst");
        cfg.anonymize_fields.insert(
            table.to_string(),
            fields.iter().map(|f| f.to_string()).collect(),
        );
        cfg
    }

    fn row_with(data: &[(&str, SqlValue)]) -> Row {
        Row {
            schema: schema(),
            data: data
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn replaces_configured_fields_and_leaves_id() {
        let cfg = config_with("users", &["email", "full_name"]);
        let mut row = row_with(&[
            ("id", SqlValue::Int(123)),
            ("email", SqlValue::Text("real@example.com".to_string())),
            ("full_name", SqlValue::Text("Real Name".to_string())),
        ]);

        anonymize(&mut row, &cfg);

        assert_eq!(row.data["id"], SqlValue::Int(123));
        assert_ne!(
            row.data["email"],
            SqlValue::Text("real@example.com".to_string())
        );
        assert_ne!(
            row.data["full_name"],
            SqlValue::Text("Real Name".to_string())
        );
        match &row.data["email"] {
            SqlValue::Text(s) => assert!(s.contains('@'), "synthetic email expected: {}", s),
            other => panic!("expected text email, got {:?}", other),
        }
    }

    #[test]
    fn unlisted_tables_are_untouched() {
        let cfg = config_with("orders", &["email"]);
        let mut row = row_with(&[("email", SqlValue::Text("keep@example.com".to_string()))]);

        anonymize(&mut row, &cfg);

        assert_eq!(
            row.data["email"],
            SqlValue::Text("keep@example.com".to_string())
        );
    }

    #[test]
    fn absence_markers_survive() {
        let cfg = config_with("users", &["email", "balance", "note"]);
        let mut row = row_with(&[
            ("email", SqlValue::Null),
            ("balance", SqlValue::Float(0.0)),
            ("note", SqlValue::Text(String::new())),
        ]);

        anonymize(&mut row, &cfg);

        assert_eq!(row.data["email"], SqlValue::Null);
        assert_eq!(row.data["balance"], SqlValue::Float(0.0));
        assert_eq!(row.data["note"], SqlValue::Text(String::new()));
    }

    #[test]
    fn integer_columns_get_integers() {
        let cfg = config_with("users", &["id"]);
        let mut row = row_with(&[("id", SqlValue::Int(42))]);

        anonymize(&mut row, &cfg);

        match row.data["id"] {
            SqlValue::Int(v) => {
                assert!(v > 0 && v <= i64::from(i32::MAX));
            }
            ref other => panic!("expected integer replacement, got {:?}", other),
        }
    }

    #[test]
    fn numeric_columns_get_floats() {
        let cfg = config_with("users", &["balance"]);
        let mut row = row_with(&[("balance", SqlValue::Float(12.5))]);

        anonymize(&mut row, &cfg);

        assert!(matches!(row.data["balance"], SqlValue::Float(v) if v > 0.0));
    }

    #[test]
    fn replacements_respect_max_length() {
        let cfg = config_with("users", &["note", "full_name"]);
        for _ in 0..20 {
            let mut row = row_with(&[
                ("note", SqlValue::Text("0123456789abc".to_string())),
                ("full_name", SqlValue::Text("someone".to_string())),
            ]);
            anonymize(&mut row, &cfg);

            let SqlValue::Text(note) = &row.data["note"] else {
                panic!("expected text note");
            };
            assert!(note.chars().count() <= 10, "note too long: {}", note);

            let SqlValue::Text(name) = &row.data["full_name"] else {
                panic!("expected text name");
            };
            assert!(name.chars().count() <= 50, "name too long: {}", name);
        }
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("hello".to_string(), 3), "hel");
        assert_eq!(truncate("hi".to_string(), 10), "hi");
    }
}
