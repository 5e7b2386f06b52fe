//! stride-db - run parameterized queries against the Stride PostgreSQL database.
//!
//! This library exposes the core modules for use by the binary and integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod output;
pub mod query;

pub use config::ConnectionConfig;
pub use db::{Driver, PostgresDriver, QueryResult, Value};
pub use error::{DbError, Result};
pub use query::{Projection, Query, QueryRunner};
