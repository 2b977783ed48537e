//! The opaque value carrier shuttled between source and destination.
//!
//! Values read from the driver are treated as an opaque payload to be handed
//! back on write; only the anonymizer inspects the discriminator. The variant
//! set covers everything the MySQL and PostgreSQL drivers materialize for
//! the supported column types; anything else decodes to `Null`.

use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue, Uuid};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// A single column value in transit.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(JsonValue),
}

/// Column name -> value mapping for one row.
pub type RowData = HashMap<String, SqlValue>;

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// True for values that mark semantic absence: NULL, strings whose
    /// trimmed form is empty, and numerically-zero integer, unsigned, or
    /// floating values. The anonymizer leaves these untouched.
    pub fn is_absent(&self) -> bool {
        match self {
            SqlValue::Null => true,
            SqlValue::Text(s) => s.trim().is_empty(),
            SqlValue::Int(i) => *i == 0,
            SqlValue::Uint(u) => *u == 0,
            SqlValue::Float(f) => *f == 0.0,
            _ => false,
        }
    }
}

/// Orders two pagination cursor values.
///
/// Both-integer pairs compare numerically; everything else falls back to the
/// textual representation, which assumes the engine's `ORDER BY` agrees with
/// lexicographic order.
pub fn compare_ids(a: &SqlValue, b: &SqlValue) -> Ordering {
    match (a, b) {
        (SqlValue::Int(x), SqlValue::Int(y)) => x.cmp(y),
        (SqlValue::Uint(x), SqlValue::Uint(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Uint(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "{}", v),
            SqlValue::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
            SqlValue::Date(v) => write!(f, "{}", v),
            SqlValue::Time(v) => write!(f, "{}", v),
            SqlValue::DateTime(v) => write!(f, "{}", v),
            SqlValue::TimestampTz(v) => write!(f, "{}", v),
            SqlValue::Uuid(v) => write!(f, "{}", v),
            SqlValue::Json(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absence_markers() {
        assert!(SqlValue::Null.is_absent());
        assert!(SqlValue::Text(String::new()).is_absent());
        assert!(SqlValue::Text("   ".to_string()).is_absent());
        assert!(SqlValue::Int(0).is_absent());
        assert!(SqlValue::Uint(0).is_absent());
        assert!(SqlValue::Float(0.0).is_absent());

        assert!(!SqlValue::Text("x".to_string()).is_absent());
        assert!(!SqlValue::Int(-1).is_absent());
        assert!(!SqlValue::Float(0.5).is_absent());
        assert!(!SqlValue::Bool(false).is_absent());
    }

    #[test]
    fn integer_ids_compare_numerically() {
        assert_eq!(
            compare_ids(&SqlValue::Int(9), &SqlValue::Int(10)),
            Ordering::Less
        );
        assert_eq!(
            compare_ids(&SqlValue::Uint(9), &SqlValue::Uint(10)),
            Ordering::Less
        );
    }

    #[test]
    fn mixed_ids_compare_textually() {
        // Lexicographic: "10" < "9".
        assert_eq!(
            compare_ids(
                &SqlValue::Text("10".to_string()),
                &SqlValue::Text("9".to_string())
            ),
            Ordering::Less
        );
        assert_eq!(
            compare_ids(
                &SqlValue::Text("abc".to_string()),
                &SqlValue::Text("abd".to_string())
            ),
            Ordering::Less
        );
    }
}
