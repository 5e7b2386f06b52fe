//! Database abstraction layer for stride-db.
//!
//! A [`Driver`] opens a [`Connection`]; a connection prepares a [`Statement`];
//! a statement opens a forward-only [`Cursor`]. Each handle borrows its parent,
//! so a cursor can never outlive its statement, nor a statement its connection.
//! Every handle must be closed explicitly; the runner does so in reverse order
//! of acquisition.

pub mod mock;
mod postgres;
mod types;

pub use mock::{LifecycleEvent, MockDriver, MockScript};
pub use postgres::PostgresDriver;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::query::Query;
use async_trait::async_trait;

/// Opens connections to a database.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Opens a new connection using the given configuration.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>>;
}

/// A live session with the database.
#[async_trait]
pub trait Connection: Send {
    /// Prepares a statement for the given query.
    async fn prepare<'c>(&'c mut self, query: &Query) -> Result<Box<dyn Statement + 'c>>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<()>;
}

/// One query's execution scope.
#[async_trait]
pub trait Statement: Send {
    /// Executes the statement and opens a cursor over its rows.
    async fn open_cursor<'s>(&'s mut self) -> Result<Box<dyn Cursor + 's>>;

    /// Releases the statement.
    async fn close(&mut self) -> Result<()>;
}

/// A forward-only, single-pass stream of result rows.
#[async_trait]
pub trait Cursor: Send {
    /// Fetches the next row, or `None` once the result set is exhausted.
    async fn next_row(&mut self) -> Result<Option<Row>>;

    /// Column metadata of the result set.
    ///
    /// Drivers that learn columns from row data return an empty slice until
    /// the first row has been fetched.
    fn columns(&self) -> &[ColumnInfo];

    /// Releases the cursor, discarding any unread rows.
    async fn close(&mut self) -> Result<()>;
}
