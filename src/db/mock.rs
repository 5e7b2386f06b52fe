//! Mock database driver for testing.
//!
//! Serves a scripted result set and records every handle acquisition and
//! release, so tests can check that resources are released exactly once and
//! in reverse order of acquisition.

use super::{ColumnInfo, Connection, Cursor, Driver, Row, Statement, Value};
use crate::config::ConnectionConfig;
use crate::error::{DbError, Result};
use crate::query::Query;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// A handle acquisition or release observed by the mock driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ConnectionOpened,
    StatementPrepared,
    CursorOpened,
    CursorClosed,
    StatementClosed,
    ConnectionClosed,
}

impl LifecycleEvent {
    fn is_open(self) -> bool {
        matches!(
            self,
            Self::ConnectionOpened | Self::StatementPrepared | Self::CursorOpened
        )
    }
}

/// What the mock database returns, and where it fails.
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    columns: Vec<ColumnInfo>,
    rows: Vec<Row>,
    fail_connect: Option<String>,
    fail_prepare: Option<String>,
    fail_open: Option<String>,
    fail_after_rows: Option<(usize, String)>,
}

impl MockScript {
    /// A script returning the given result set.
    pub fn rows(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            ..Default::default()
        }
    }

    /// A script returning one `title` column with the given values.
    pub fn titles(titles: &[&str]) -> Self {
        Self::rows(
            vec![ColumnInfo::new("title", "TEXT")],
            titles.iter().map(|t| vec![Value::from(*t)]).collect(),
        )
    }

    /// A script returning no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fails when connecting (unreachable host, bad credentials).
    pub fn failing_connect(mut self, msg: impl Into<String>) -> Self {
        self.fail_connect = Some(msg.into());
        self
    }

    /// Fails when preparing the statement.
    pub fn failing_prepare(mut self, msg: impl Into<String>) -> Self {
        self.fail_prepare = Some(msg.into());
        self
    }

    /// Fails when executing the statement (syntax errors, missing relations).
    pub fn failing_open(mut self, msg: impl Into<String>) -> Self {
        self.fail_open = Some(msg.into());
        self
    }

    /// Fails when fetching the row after the first `count` rows.
    pub fn failing_after(mut self, count: usize, msg: impl Into<String>) -> Self {
        self.fail_after_rows = Some((count, msg.into()));
        self
    }
}

#[derive(Debug, Default)]
struct Recorder {
    events: Mutex<Vec<LifecycleEvent>>,
    queries: Mutex<Vec<Query>>,
}

impl Recorder {
    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// A driver that serves a [`MockScript`] and records lifecycle events.
///
/// Clones share the same event log.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    script: MockScript,
    recorder: Arc<Recorder>,
}

impl MockDriver {
    /// Creates a mock driver serving the given script.
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            recorder: Arc::default(),
        }
    }

    /// Returns every lifecycle event recorded so far, in order.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.recorder
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns every query prepared so far, in order.
    pub fn queries(&self) -> Vec<Query> {
        self.recorder
            .queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of handles opened but not yet closed.
    pub fn open_handles(&self) -> usize {
        self.events().iter().fold(0usize, |open, event| {
            if event.is_open() {
                open + 1
            } else {
                open.saturating_sub(1)
            }
        })
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        if let Some(msg) = &self.script.fail_connect {
            return Err(DbError::connection(msg.clone()));
        }

        self.recorder.record(LifecycleEvent::ConnectionOpened);
        Ok(Box::new(MockConnection {
            script: self.script.clone(),
            recorder: Arc::clone(&self.recorder),
        }))
    }
}

struct MockConnection {
    script: MockScript,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn prepare<'c>(&'c mut self, query: &Query) -> Result<Box<dyn Statement + 'c>> {
        self.recorder
            .queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());

        if let Some(msg) = &self.script.fail_prepare {
            return Err(DbError::query(msg.clone()));
        }

        self.recorder.record(LifecycleEvent::StatementPrepared);
        Ok(Box::new(MockStatement { conn: self }))
    }

    async fn close(&mut self) -> Result<()> {
        self.recorder.record(LifecycleEvent::ConnectionClosed);
        Ok(())
    }
}

struct MockStatement<'c> {
    conn: &'c mut MockConnection,
}

#[async_trait]
impl<'c> Statement for MockStatement<'c> {
    async fn open_cursor<'s>(&'s mut self) -> Result<Box<dyn Cursor + 's>> {
        let script = &self.conn.script;
        if let Some(msg) = &script.fail_open {
            return Err(DbError::query(msg.clone()));
        }

        self.conn.recorder.record(LifecycleEvent::CursorOpened);
        Ok(Box::new(MockCursor {
            script,
            recorder: &self.conn.recorder,
            position: 0,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.conn.recorder.record(LifecycleEvent::StatementClosed);
        Ok(())
    }
}

struct MockCursor<'s> {
    script: &'s MockScript,
    recorder: &'s Recorder,
    position: usize,
}

#[async_trait]
impl<'s> Cursor for MockCursor<'s> {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        if let Some((count, msg)) = &self.script.fail_after_rows {
            if self.position >= *count {
                return Err(DbError::query(msg.clone()));
            }
        }

        let row = self.script.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn columns(&self) -> &[ColumnInfo] {
        &self.script.columns
    }

    async fn close(&mut self) -> Result<()> {
        self.recorder.record(LifecycleEvent::CursorClosed);
        Ok(())
    }
}
