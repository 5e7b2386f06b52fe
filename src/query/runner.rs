//! Query execution with scoped resource handling.
//!
//! [`QueryRunner`] opens one connection per run, executes a single statement,
//! drains its cursor, and releases cursor, statement, and connection in that
//! order on every exit path.

use std::future::Future;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{Projection, Query};
use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, Connection, Cursor, Driver, QueryResult, Row, Statement};
use crate::error::{DbError, Result};

/// Runs queries against a database with an injected configuration.
#[derive(Debug, Clone)]
pub struct QueryRunner<D> {
    driver: D,
    config: ConnectionConfig,
}

impl<D: Driver> QueryRunner<D> {
    /// Creates a runner that connects through `driver` using `config`.
    pub fn new(driver: D, config: ConnectionConfig) -> Self {
        Self { driver, config }
    }

    /// Returns the injected connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Executes `query` and collects the projected columns of every row.
    ///
    /// Rows are fully collected before returning, so a failure part-way
    /// through the result set yields an error and no rows.
    pub async fn run(&self, query: &Query, projection: &Projection) -> Result<QueryResult> {
        let start = Instant::now();

        let mut connection = self.driver.connect(&self.config).await?;
        let result = execute(connection.as_mut(), query, projection).await;
        let closed = connection.close().await;
        let (columns, rows) = release(result, closed, "connection")?;

        let execution_time = start.elapsed();
        info!(
            rows = rows.len(),
            elapsed_ms = execution_time.as_millis() as u64,
            "Query completed"
        );

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }

    /// Executes raw SQL and returns the `title` column of each row as text.
    ///
    /// The text is sent to the server verbatim. Never build it from untrusted
    /// input; use [`QueryRunner::run`] with bound parameters instead.
    pub async fn basic_query(&self, sql: &str) -> Result<Vec<String>> {
        let result = self.run(&Query::new(sql), &Projection::title()).await?;
        Ok(result.lines())
    }

    /// Blocking form of [`QueryRunner::run`].
    ///
    /// Must not be called from within an async runtime.
    pub fn run_blocking(&self, query: &Query, projection: &Projection) -> Result<QueryResult> {
        block_on(self.run(query, projection))?
    }

    /// Blocking form of [`QueryRunner::basic_query`].
    ///
    /// Must not be called from within an async runtime.
    pub fn basic_query_blocking(&self, sql: &str) -> Result<Vec<String>> {
        block_on(self.basic_query(sql))?
    }
}

/// Drives a future to completion on a fresh current-thread runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DbError::internal(format!("Failed to start runtime: {e}")))?;
    Ok(runtime.block_on(future))
}

/// Prepares a statement on `connection`, drains it, and releases it.
async fn execute(
    connection: &mut dyn Connection,
    query: &Query,
    projection: &Projection,
) -> Result<(Vec<ColumnInfo>, Vec<Row>)> {
    let mut statement = connection.prepare(query).await?;
    let result = drain(statement.as_mut(), projection).await;
    let closed = statement.close().await;
    release(result, closed, "statement")
}

/// Opens a cursor on `statement`, collects its rows, and releases it.
async fn drain(
    statement: &mut dyn Statement,
    projection: &Projection,
) -> Result<(Vec<ColumnInfo>, Vec<Row>)> {
    let mut cursor = statement.open_cursor().await?;
    let result = collect(cursor.as_mut(), projection).await;
    let closed = cursor.close().await;
    release(result, closed, "cursor")
}

/// Pulls every row from `cursor`, keeping only the projected columns.
///
/// The projection is resolved against the cursor's columns once the first
/// row has arrived; an empty result set never fails projection.
async fn collect(
    cursor: &mut dyn Cursor,
    projection: &Projection,
) -> Result<(Vec<ColumnInfo>, Vec<Row>)> {
    let mut indexes: Option<Vec<usize>> = None;
    let mut columns = Vec::new();
    let mut rows = Vec::new();

    while let Some(row) = cursor.next_row().await? {
        if indexes.is_none() {
            let resolved = projection.resolve(cursor.columns())?;
            columns = resolved
                .iter()
                .map(|&i| cursor.columns()[i].clone())
                .collect();
            debug!(columns = ?columns, "Resolved projection");
            indexes = Some(resolved);
        }

        if let Some(picked) = &indexes {
            rows.push(project(row, picked)?);
        }
    }

    debug!(rows = rows.len(), "Cursor exhausted");
    Ok((columns, rows))
}

fn project(row: Row, indexes: &[usize]) -> Result<Row> {
    indexes
        .iter()
        .map(|&i| {
            row.get(i)
                .cloned()
                .ok_or_else(|| DbError::query(format!("Row has no value at column {i}")))
        })
        .collect()
}

/// Combines the outcome of a scoped body with the outcome of releasing its handle.
///
/// A body error wins over a release error; the release error is logged.
fn release<T>(result: Result<T>, closed: Result<()>, handle: &str) -> Result<T> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!("Failed to release {handle} after error: {close_err}");
            Err(err)
        }
    }
}
