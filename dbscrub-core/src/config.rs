//! Run configuration and the scrub rules file.
//!
//! The rules file is a line-oriented document with three sections:
//!
//! ```text
//! # columns to replace with synthetic values
//! [anonymize]
//! users: email, name, phone
//!
//! # tables to bypass entirely
//! [skip]
//! audit
//!
//! # tables to copy partially, percent in (0, 100]
//! [sample]
//! logs: 10
//! ```
//!
//! Lines before any section header are treated as `anonymize` entries, which
//! keeps older flat-format files working. An empty or absent file is legal.

use crate::error::{Result, ScrubError};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Configuration for a transfer run: connection endpoints, pool sizing,
/// diagnostics flags, and the parsed scrub rules.
#[derive(Debug, Clone)]
pub struct ScrubConfig {
    /// Source database URL.
    pub source_url: String,
    /// Destination database URL.
    pub dest_url: String,
    /// Worker count for both the reader and writer pools.
    pub workers: usize,
    /// Echo each SQL statement before execution.
    pub verbose: bool,
    /// Emit per-row error diagnostics.
    pub debug: bool,
    /// Table name -> set of column names to anonymize.
    pub anonymize_fields: HashMap<String, HashSet<String>>,
    /// Tables to bypass entirely.
    pub skip_tables: HashSet<String>,
    /// Table name -> sample percent in (0, 100].
    pub sample_percent: HashMap<String, f64>,
}

impl ScrubConfig {
    /// Creates a configuration with default pool sizing and no rules.
    pub fn new(source_url: impl Into<String>, dest_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            dest_url: dest_url.into(),
            workers: 4,
            verbose: false,
            debug: false,
            anonymize_fields: HashMap::new(),
            skip_tables: HashSet::new(),
            sample_percent: HashMap::new(),
        }
    }

    /// Columns configured for anonymization on `table`, if any.
    pub fn fields_for(&self, table: &str) -> Option<&HashSet<String>> {
        self.anonymize_fields.get(table)
    }

    /// Sample percent configured for `table`, if any.
    pub fn sample_for(&self, table: &str) -> Option<f64> {
        self.sample_percent.get(table).copied()
    }

    /// Loads the rules file at `path` into this configuration.
    ///
    /// A missing file is not an error; malformed lines and out-of-range
    /// sample percents are.
    pub fn load_rules(&mut self, path: &Path) -> Result<()> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(ScrubError::configuration(format!(
                    "failed to read rules file {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        self.apply_rules(&content)
    }

    /// Parses rules from `content` and merges them into this configuration.
    pub fn apply_rules(&mut self, content: &str) -> Result<()> {
        let mut section = Section::Anonymize;

        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = match header.trim() {
                    "anonymize" => Section::Anonymize,
                    "skip" => Section::Skip,
                    "sample" => Section::Sample,
                    other => {
                        return Err(ScrubError::configuration(format!(
                            "unknown rules section '[{}]'",
                            other
                        )))
                    }
                };
                continue;
            }

            match section {
                Section::Anonymize => self.parse_anonymize_line(line)?,
                Section::Skip => {
                    self.skip_tables.insert(line.to_string());
                }
                Section::Sample => self.parse_sample_line(line)?,
            }
        }

        Ok(())
    }

    fn parse_anonymize_line(&mut self, line: &str) -> Result<()> {
        let (table, fields) = split_rule(line)?;
        let columns: HashSet<String> = fields
            .split(',')
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(|f| f.to_string())
            .collect();
        self.anonymize_fields
            .entry(table.to_string())
            .or_default()
            .extend(columns);
        Ok(())
    }

    fn parse_sample_line(&mut self, line: &str) -> Result<()> {
        let (table, value) = split_rule(line)?;
        let percent: f64 = value.parse().map_err(|_| {
            ScrubError::configuration(format!(
                "invalid sample percent for table '{}': '{}'",
                table, value
            ))
        })?;
        if !(percent > 0.0 && percent <= 100.0) {
            return Err(ScrubError::configuration(format!(
                "sample percent for table '{}' must be in (0, 100], got {}",
                table, percent
            )));
        }
        self.sample_percent.insert(table.to_string(), percent);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Section {
    Anonymize,
    Skip,
    Sample,
}

/// Splits a `table: value` rule line on the first colon.
fn split_rule(line: &str) -> Result<(&str, &str)> {
    let (table, rest) = line.split_once(':').ok_or_else(|| {
        ScrubError::configuration(format!(
            "invalid rules line (expected 'table: value'): {}",
            line
        ))
    })?;
    let table = table.trim();
    if table.is_empty() {
        return Err(ScrubError::configuration(format!(
            "empty table name in rules line: {}",
            line
        )));
    }
    Ok((table, rest.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config() -> ScrubConfig {
        ScrubConfig::new("mysql://s@localhost/src", "mysql://d@localhost/dst")
    }

    #[test]
    fn parses_all_sections() {
        let mut cfg = config();
        cfg.apply_rules(
            "# comment\n\
             [anonymize]\n\
             users: email, name, phone\n\
             orders: address\n\
             \n\
             [skip]\n\
             audit\n\
             \n\
             [sample]\n\
             logs: 10\n",
        )
        .unwrap();

        let users = cfg.fields_for("users").unwrap();
        assert_eq!(users.len(), 3);
        assert!(users.contains("email") && users.contains("name") && users.contains("phone"));
        assert_eq!(cfg.fields_for("orders").unwrap().len(), 1);
        assert!(cfg.skip_tables.contains("audit"));
        assert_eq!(cfg.sample_for("logs"), Some(10.0));
        assert_eq!(cfg.sample_for("users"), None);
    }

    #[test]
    fn flat_format_defaults_to_anonymize() {
        let mut cfg = config();
        cfg.apply_rules("users: email, name\norders: address\n")
            .unwrap();
        assert!(cfg.fields_for("users").unwrap().contains("email"));
        assert!(cfg.fields_for("orders").unwrap().contains("address"));
    }

    #[test]
    fn empty_content_is_legal() {
        let mut cfg = config();
        cfg.apply_rules("").unwrap();
        assert!(cfg.anonymize_fields.is_empty());
        assert!(cfg.skip_tables.is_empty());
        assert!(cfg.sample_percent.is_empty());
    }

    #[test]
    fn missing_file_is_legal() {
        let mut cfg = config();
        cfg.load_rules(Path::new("/nonexistent/dbscrub.conf")).unwrap();
        assert!(cfg.anonymize_fields.is_empty());
    }

    #[test]
    fn loads_rules_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sample]\nlogs: 25.5").unwrap();

        let mut cfg = config();
        cfg.load_rules(file.path()).unwrap();
        assert_eq!(cfg.sample_for("logs"), Some(25.5));
    }

    #[test]
    fn rejects_out_of_range_percent() {
        let mut cfg = config();
        assert!(cfg.apply_rules("[sample]\nlogs: 0").is_err());
        assert!(cfg.apply_rules("[sample]\nlogs: 101").is_err());
        assert!(cfg.apply_rules("[sample]\nlogs: -5").is_err());
        assert!(cfg.apply_rules("[sample]\nlogs: many").is_err());
    }

    #[test]
    fn rejects_malformed_lines() {
        let mut cfg = config();
        assert!(cfg.apply_rules("[anonymize]\nno colon here").is_err());
        assert!(cfg.apply_rules("[anonymize]\n: email").is_err());
        assert!(cfg.apply_rules("[mystery]\nusers: email").is_err());
    }
}
