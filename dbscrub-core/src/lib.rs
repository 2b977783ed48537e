//! Core engine for dbscrub.
//!
//! This crate copies the contents of a relational source database into a
//! destination database of the same logical schema, replacing configured
//! columns with synthetic values so the destination is safe for
//! non-production use. Transfers are incremental and idempotent: re-running
//! against a populated destination converges it to the source (minus
//! anonymization) without duplicating rows, deleting destination rows that
//! fall inside a processed key range but no longer exist in the source.
//!
//! # Architecture
//! - [`schema`] introspects table and column metadata from information-schema
//! - [`dialect`] isolates MySQL/PostgreSQL differences behind a tagged enum
//! - [`anonymizer`] is a pure per-row transform driven by [`config`]
//! - [`transfer`] runs the concurrent reader/writer pipeline

pub mod anonymizer;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod logging;
pub mod schema;
pub mod transfer;
pub mod value;

pub use anonymizer::Row;
pub use config::ScrubConfig;
pub use connection::Connection;
pub use dialect::Dialect;
pub use error::{redact_database_url, Result, ScrubError};
pub use schema::{ColumnSchema, TableSchema};
pub use transfer::{run, TransferSummary};
pub use value::SqlValue;
