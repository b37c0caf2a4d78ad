//! Database handles the migration engine runs against.
//!
//! The engine only needs a narrow slice of a driver: begin/commit/rollback,
//! parameterised single statements, raw multi-statement scripts, and a read
//! of the tracking rows. That slice is expressed as the [`Database`] and
//! [`Transaction`] traits so tests and embedders can inject their own
//! handle. Two `sqlx` backends ship with the crate.

mod postgres;
mod sqlite;

pub use postgres::PostgresDatabase;
pub use sqlite::SqliteDatabase;

use crate::state::MigrationRecord;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Unsupported database URL: {0}")]
    UnsupportedUrl(String),
}

impl DatabaseError {
    /// Whether the database could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, DatabaseError::Connection(_))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DatabaseError::Connection(err.to_string()),
            _ => DatabaseError::Query(err.to_string()),
        }
    }
}

/// SQL flavour of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Positional bind placeholder for the 1-based `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", index),
            Dialect::Postgres => format!("${}", index),
        }
    }

    /// Column type used for timestamps.
    pub fn timestamp_type(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "TIMESTAMP",
            Dialect::Postgres => "TIMESTAMPTZ",
        }
    }

    /// Expression producing the current time.
    pub fn current_timestamp(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "CURRENT_TIMESTAMP",
            Dialect::Postgres => "now()",
        }
    }
}

/// A pooled database handle.
#[async_trait]
pub trait Database: Send + Sync {
    /// SQL flavour spoken by this handle.
    fn dialect(&self) -> Dialect;

    /// Execute a single statement outside any explicit transaction.
    async fn execute(&self, sql: &str, params: &[&str]) -> Result<u64, DatabaseError>;

    /// Run a query selecting `name` and `applied_at` columns.
    async fn fetch_records(&self, sql: &str) -> Result<Vec<MigrationRecord>, DatabaseError>;

    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>, DatabaseError>;
}

/// An open transaction. Dropping it without commit rolls it back.
#[async_trait]
pub trait Transaction: Send {
    /// Execute a single parameterised statement.
    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64, DatabaseError>;

    /// Execute a script that may contain several `;`-separated statements.
    async fn execute_script(&mut self, sql: &str) -> Result<(), DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}

/// Connect to the database named by `url`.
///
/// `sqlite:` URLs open (and create) a SQLite file, `postgres://` and
/// `postgresql://` URLs open a PostgreSQL pool.
pub async fn connect(url: &str) -> Result<Arc<dyn Database>, DatabaseError> {
    if url.starts_with("sqlite:") {
        Ok(Arc::new(SqliteDatabase::connect(url).await?))
    } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(Arc::new(PostgresDatabase::connect(url).await?))
    } else {
        Err(DatabaseError::UnsupportedUrl(url.to_string()))
    }
}
