//! Persisted record of which migrations have been applied.
//!
//! One table, one row per applied migration, keyed by filename. Rows are
//! inserted when an `up` commits and deleted when a `down` commits; they are
//! never updated.

mod types;

pub use types::MigrationRecord;

use crate::database::{Database, DatabaseError, Transaction};
use crate::utils::{quote_identifier, DEFAULT_TABLE_NAME};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Error types for tracking table access.
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Failed to create tracking table {0}: {1}")]
    CreateTable(String, DatabaseError),

    #[error("Failed to read tracking table {0}: {1}")]
    Read(String, DatabaseError),

    #[error("Failed to write tracking table {0}: {1}")]
    Write(String, DatabaseError),
}

impl TrackingError {
    /// Whether the underlying failure was losing the database entirely.
    pub fn is_connection(&self) -> bool {
        match self {
            TrackingError::CreateTable(_, e)
            | TrackingError::Read(_, e)
            | TrackingError::Write(_, e) => e.is_connection(),
        }
    }
}

/// Owner of the tracking table.
pub struct StateStore {
    db: Arc<dyn Database>,
    table: String,
}

impl StateStore {
    /// Create a store using the default table name.
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self::with_table(db, DEFAULT_TABLE_NAME)
    }

    /// Create a store tracking into `table`.
    pub fn with_table(db: Arc<dyn Database>, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Create the tracking table if it does not exist yet.
    pub async fn ensure_table(&self) -> Result<(), TrackingError> {
        let dialect = self.db.dialect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                name TEXT PRIMARY KEY NOT NULL,\n    \
                applied_at {} NOT NULL DEFAULT {}\n\
            )",
            quote_identifier(&self.table),
            dialect.timestamp_type(),
            dialect.current_timestamp()
        );

        self.db
            .execute(&sql, &[])
            .await
            .map_err(|e| TrackingError::CreateTable(self.table.clone(), e))?;
        Ok(())
    }

    /// All applied migrations, ordered by name ascending.
    pub async fn list_applied(&self) -> Result<Vec<MigrationRecord>, TrackingError> {
        self.ensure_table().await?;

        let sql = format!(
            "SELECT name, applied_at FROM {} ORDER BY name ASC",
            quote_identifier(&self.table)
        );
        self.db
            .fetch_records(&sql)
            .await
            .map_err(|e| TrackingError::Read(self.table.clone(), e))
    }

    /// Mark `name` as applied. Recording an already applied name is a no-op.
    pub async fn record_migration(&self, name: &str) -> Result<(), TrackingError> {
        let sql = self.insert_sql();
        let inserted = self
            .db
            .execute(&sql, &[name])
            .await
            .map_err(|e| TrackingError::Write(self.table.clone(), e))?;

        if inserted == 0 {
            debug!(migration = %name, "Migration already recorded");
        }
        Ok(())
    }

    /// Forget `name`. Removing an unknown name is a no-op.
    pub async fn remove_record(&self, name: &str) -> Result<(), TrackingError> {
        let sql = self.delete_sql();
        self.db
            .execute(&sql, &[name])
            .await
            .map_err(|e| TrackingError::Write(self.table.clone(), e))?;
        Ok(())
    }

    /// Same as [`record_migration`](Self::record_migration), inside `tx`.
    pub async fn record_in(
        &self,
        tx: &mut dyn Transaction,
        name: &str,
    ) -> Result<(), TrackingError> {
        let sql = self.insert_sql();
        tx.execute(&sql, &[name])
            .await
            .map_err(|e| TrackingError::Write(self.table.clone(), e))?;
        Ok(())
    }

    /// Same as [`remove_record`](Self::remove_record), inside `tx`.
    pub async fn remove_in(
        &self,
        tx: &mut dyn Transaction,
        name: &str,
    ) -> Result<(), TrackingError> {
        let sql = self.delete_sql();
        tx.execute(&sql, &[name])
            .await
            .map_err(|e| TrackingError::Write(self.table.clone(), e))?;
        Ok(())
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (name) VALUES ({}) ON CONFLICT (name) DO NOTHING",
            quote_identifier(&self.table),
            self.db.dialect().placeholder(1)
        )
    }

    fn delete_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE name = {}",
            quote_identifier(&self.table),
            self.db.dialect().placeholder(1)
        )
    }
}
