//! Console output for query results.
//!
//! Rows go to the given writer one line each (or as a single JSON document).
//! A failed run produces exactly one line, [`DbError::LEGACY_MESSAGE`].

use std::io::{self, Write};

use crate::db::QueryResult;
use crate::error::{DbError, Result};

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per row, projected values separated by tabs.
    #[default]
    Text,
    /// A JSON document with columns, rows, and timing.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// Writes a successful result in the given format.
pub fn write_result<W: Write>(
    out: &mut W,
    result: &QueryResult,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => {
            for line in result.lines() {
                writeln!(out, "{line}")?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, result)?;
            writeln!(out)?;
        }
    }
    out.flush()
}

/// Writes the fixed failure line.
pub fn write_failure<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", DbError::LEGACY_MESSAGE)?;
    out.flush()
}

/// Writes either the rows of a successful run or the failure line.
///
/// Returns whether the run succeeded.
pub fn report<W: Write>(
    out: &mut W,
    outcome: &Result<QueryResult>,
    format: OutputFormat,
) -> io::Result<bool> {
    match outcome {
        Ok(result) => write_result(out, result, format).map(|()| true),
        Err(_) => write_failure(out).map(|()| false),
    }
}
