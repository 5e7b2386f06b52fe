//! Query definition and execution for stride-db.
//!
//! A [`Query`] is SQL text plus positional parameters; a [`Projection`] picks
//! the columns reported from each row. The [`runner`] module drives a query
//! through a database driver.

pub mod runner;

pub use runner::{block_on, QueryRunner};

use crate::db::{ColumnInfo, Value};
use crate::error::{DbError, Result};

/// SQL text with positional parameters (`$1`, `$2`, ...).
///
/// Parameters are sent to the server separately from the text, so values
/// never need quoting. A query with no bound parameters is sent verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    sql: String,
    params: Vec<Value>,
}

impl Query {
    /// Creates a query with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Binds the next positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Binds several positional parameters in order.
    pub fn bind_all<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.params.extend(values.into_iter().map(Into::into));
        self
    }

    /// Returns the SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the bound parameters in order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Which columns to report from each result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// The named columns, in the given order.
    Columns(Vec<String>),
    /// Every column, in result-set order.
    All,
}

impl Projection {
    /// The column reported by [`QueryRunner::basic_query`].
    pub const TITLE_COLUMN: &'static str = "title";

    /// Projects a single named column.
    pub fn column(name: impl Into<String>) -> Self {
        Self::Columns(vec![name.into()])
    }

    /// Projects the named columns in order.
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Columns(names.into_iter().map(Into::into).collect())
    }

    /// Projects the `title` column.
    pub fn title() -> Self {
        Self::column(Self::TITLE_COLUMN)
    }

    /// Resolves the projection to column indexes of a result set.
    ///
    /// Names match exactly first, then ignoring ASCII case. The first missing
    /// name fails the whole projection.
    pub fn resolve(&self, columns: &[ColumnInfo]) -> Result<Vec<usize>> {
        match self {
            Self::All => Ok((0..columns.len()).collect()),
            Self::Columns(names) => names
                .iter()
                .map(|name| find_column(columns, name).ok_or_else(|| DbError::column_not_found(name)))
                .collect(),
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::title()
    }
}

fn find_column(columns: &[ColumnInfo], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|c| c.name == name)
        .or_else(|| columns.iter().position(|c| c.name.eq_ignore_ascii_case(name)))
}
