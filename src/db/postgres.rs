//! PostgreSQL driver implementation.
//!
//! Provides [`PostgresDriver`], which opens a single `PgConnection` per call
//! using sqlx. No pool is involved: the connection lives exactly as long as
//! the run that opened it.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, Connection, Cursor, Driver, Row, Statement, Value};
use crate::error::{DbError, Result};
use crate::query::Query;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use sqlx::postgres::{
    PgArguments, PgColumn, PgConnectOptions, PgConnection, PgRow, PgStatement as PreparedStatement,
    PgTypeInfo, PgTypeKind, Postgres,
};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, Uuid};
use sqlx::{
    Column as SqlxColumn, Connection as SqlxConnection, Decode, Executor, Row as SqlxRow,
    Statement as SqlxStatement, Type, TypeInfo,
};
use tracing::debug;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Application name reported to the server in `pg_stat_activity`.
const APPLICATION_NAME: &str = "stride-db";

/// PostgreSQL driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDriver;

impl PostgresDriver {
    /// Creates a new PostgreSQL driver.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        let options = connect_options(config)?;

        debug!("Connecting to {}", config.display_string());
        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| map_connection_error(e, config))?;
        debug!("Successfully connected to database");

        Ok(Box::new(PgSession { conn: Some(conn) }))
    }
}

/// An open PostgreSQL session. `None` once closed.
struct PgSession {
    conn: Option<PgConnection>,
}

#[async_trait]
impl Connection for PgSession {
    async fn prepare<'c>(&'c mut self, query: &Query) -> Result<Box<dyn Statement + 'c>> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DbError::internal("connection already closed"))?;

        debug!(params = query.params().len(), "Preparing statement");
        let types: Vec<PgTypeInfo> = query.params().iter().map(param_type).collect();
        let prepared = (&mut *conn)
            .prepare_with(query.sql(), &types)
            .await
            .map_err(|e| DbError::query(format_query_error(e)))?;
        let prepared = SqlxStatement::to_owned(&prepared);

        Ok(Box::new(PgStatement {
            conn,
            prepared,
            params: query.params().to_vec(),
        }))
    }

    async fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => {
                conn.close()
                    .await
                    .map_err(|e| DbError::connection(format!("Failed to close connection: {e}")))?;
                debug!("Connection closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// A statement prepared on the server. sqlx keeps it in the connection's
/// statement cache, so it is deallocated when the connection closes.
struct PgStatement<'c> {
    conn: &'c mut PgConnection,
    prepared: PreparedStatement<'static>,
    params: Vec<Value>,
}

#[async_trait]
impl<'c> Statement for PgStatement<'c> {
    async fn open_cursor<'s>(&'s mut self) -> Result<Box<dyn Cursor + 's>> {
        let PgStatement {
            conn,
            prepared,
            params,
        } = self;
        let rows = bind_params(prepared.query(), params).fetch(&mut **conn);
        Ok(Box::new(PgCursor {
            rows,
            columns: Vec::new(),
        }))
    }

    async fn close(&mut self) -> Result<()> {
        debug!("Statement released");
        Ok(())
    }
}

struct PgCursor<'s> {
    rows: BoxStream<'s, std::result::Result<PgRow, sqlx::Error>>,
    columns: Vec<ColumnInfo>,
}

#[async_trait]
impl<'s> Cursor for PgCursor<'s> {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        let next = self
            .rows
            .try_next()
            .await
            .map_err(|e| DbError::query(format_query_error(e)))?;

        match next {
            Some(row) => {
                if self.columns.is_empty() {
                    self.columns = column_info(&row);
                }
                convert_row(&row).map(Some)
            }
            None => Ok(None),
        }
    }

    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the stream discards unread rows; sqlx drains them on the next use of the connection.
        self.rows = stream::empty().boxed();
        debug!("Cursor closed");
        Ok(())
    }
}

/// Builds connect options from a validated configuration.
fn connect_options(config: &ConnectionConfig) -> Result<PgConnectOptions> {
    config.validate()?;

    let mut options = PgConnectOptions::new().application_name(APPLICATION_NAME);
    if let Some(host) = &config.host {
        options = options.host(host);
    }
    if let Some(port) = config.port {
        options = options.port(port);
    }
    if let Some(database) = &config.database {
        options = options.database(database);
    }
    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }

    Ok(options)
}

/// Binds positional parameters with their natural PostgreSQL types.
fn bind_params<'q>(mut query: PgQuery<'q>, params: &[Value]) -> PgQuery<'q> {
    for param in params {
        query = match param.clone() {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(v),
            Value::Int(v) => query.bind(v),
            Value::Float(v) => query.bind(v),
            Value::String(v) => query.bind(v),
            Value::Bytes(v) => query.bind(v),
        };
    }
    query
}

/// The parameter type declared at prepare time; matches what [`bind_params`] sends.
fn param_type(value: &Value) -> PgTypeInfo {
    match value {
        Value::Null | Value::String(_) => <String as Type<Postgres>>::type_info(),
        Value::Bool(_) => <bool as Type<Postgres>>::type_info(),
        Value::Int(_) => <i64 as Type<Postgres>>::type_info(),
        Value::Float(_) => <f64 as Type<Postgres>>::type_info(),
        Value::Bytes(_) => <Vec<u8> as Type<Postgres>>::type_info(),
    }
}

fn column_info(row: &PgRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
///
/// Only SQL NULL becomes [`Value::Null`]. Dates, times, UUIDs, and NUMERIC
/// are rendered as text; a value that cannot be decoded is a query error.
fn convert_value(row: &PgRow, index: usize, column: &PgColumn) -> Result<Value> {
    let type_info = column.type_info();

    let value = match type_info.name().to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index, column)?.map(Value::Bool),
        "INT2" | "SMALLINT" => decode::<i16>(row, index, column)?.map(|v| Value::Int(v.into())),
        "INT4" | "INT" | "INTEGER" => {
            decode::<i32>(row, index, column)?.map(|v| Value::Int(v.into()))
        }
        "INT8" | "BIGINT" => decode::<i64>(row, index, column)?.map(Value::Int),
        "FLOAT4" | "REAL" => decode::<f32>(row, index, column)?.map(|v| Value::Float(v.into())),
        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64>(row, index, column)?.map(Value::Float),
        "NUMERIC" => decode::<Decimal>(row, index, column)?.map(text),
        "DATE" => decode::<NaiveDate>(row, index, column)?.map(text),
        "TIME" => decode::<NaiveTime>(row, index, column)?.map(text),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, index, column)?.map(text),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, index, column)?.map(text),
        "UUID" => decode::<Uuid>(row, index, column)?.map(text),
        "BYTEA" => decode::<Vec<u8>>(row, index, column)?.map(Value::Bytes),
        "JSON" | "JSONB" => decode::<serde_json::Value>(row, index, column)?.map(text),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" | "UNKNOWN" => {
            decode::<String>(row, index, column)?.map(Value::String)
        }
        // Enum labels travel as UTF-8 text in both wire formats.
        _ if matches!(type_info.kind(), PgTypeKind::Enum(_)) => row
            .try_get_unchecked::<Option<String>, _>(index)
            .map_err(|e| decode_error(column, e))?
            .map(Value::String),
        other => {
            return Err(DbError::query(format!(
                "Unsupported type {other} for column '{}'. Cast it to text in the query.",
                column.name()
            )))
        }
    };

    Ok(value.unwrap_or(Value::Null))
}

fn decode<'r, T>(row: &'r PgRow, index: usize, column: &PgColumn) -> Result<Option<T>>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .map_err(|e| decode_error(column, e))
}

fn decode_error(column: &PgColumn, error: sqlx::Error) -> DbError {
    DbError::query(format!("Cannot read column '{}': {error}", column.name()))
}

fn text<T: ToString>(value: T) -> Value {
    Value::String(value.to_string())
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> DbError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port.unwrap_or(5432);
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        DbError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        DbError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        DbError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        DbError::connection("Server requires SSL.".to_string())
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        DbError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        DbError::connection(error.to_string())
    }
}

/// Formats a query error with PostgreSQL detail and hint fields when present.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }

        if let Some(column) = pg_error.column() {
            result.push_str("\n  COLUMN: ");
            result.push_str(column);
        }
    }

    result
}
