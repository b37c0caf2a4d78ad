//! Types for the migration system.

use super::schema::Schema;
use crate::database::DatabaseError;
use crate::discovery::{DiscoveryError, MigrationFile};
use crate::state::{MigrationRecord, TrackingError};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Error types for migration operations.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to load migration {0}: {1}")]
    Resolve(String, String),

    #[error("Migration {name} is missing {direction}() export")]
    MissingStep { name: String, direction: Direction },

    #[error("Migration {0} failed: {1}")]
    Execution(String, String),

    #[error("Invalid run configuration: {0}")]
    InvalidConfig(String),
}

impl MigrationError {
    /// Errors that abort a whole batch instead of failing one migration:
    /// the database cannot be reached at all.
    pub fn is_fatal(&self) -> bool {
        match self {
            MigrationError::Database(e) => e.is_connection(),
            MigrationError::Tracking(e) => e.is_connection(),
            _ => false,
        }
    }
}

/// Direction of migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply a migration.
    Up,
    /// Revert a migration.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.pad("up"),
            Direction::Down => f.pad("down"),
        }
    }
}

/// Outcome of one attempted migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStatus::Success => f.pad("success"),
            MigrationStatus::Failed => f.pad("failed"),
            MigrationStatus::Skipped => f.pad("skipped"),
        }
    }
}

/// Result of migration execution. One per attempted migration per run.
#[derive(Debug)]
pub struct MigrationResult {
    pub direction: Direction,
    pub migration_name: String,
    pub status: MigrationStatus,
    pub duration_ms: u64,
    /// Set when `status` is `Failed`.
    pub error: Option<MigrationError>,
}

impl MigrationResult {
    pub fn success(direction: Direction, name: &str, duration_ms: u64) -> Self {
        Self {
            direction,
            migration_name: name.to_string(),
            status: MigrationStatus::Success,
            duration_ms,
            error: None,
        }
    }

    pub fn failed(
        direction: Direction,
        name: &str,
        duration_ms: u64,
        error: MigrationError,
    ) -> Self {
        Self {
            direction,
            migration_name: name.to_string(),
            status: MigrationStatus::Failed,
            duration_ms,
            error: Some(error),
        }
    }

    pub fn skipped(direction: Direction, name: &str) -> Self {
        Self {
            direction,
            migration_name: name.to_string(),
            status: MigrationStatus::Skipped,
            duration_ms: 0,
            error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == MigrationStatus::Failed
    }
}

/// Caller-supplied parameters of one batch.
#[derive(Debug, Clone)]
pub struct MigrationRunConfig {
    pub direction: Direction,
    pub dry_run: bool,
    pub migrations_path: PathBuf,
    /// Filename (or filename without extension) to stop at / roll back.
    pub target_migration: Option<String>,
}

impl MigrationRunConfig {
    pub fn new(direction: Direction, migrations_path: impl Into<PathBuf>) -> Self {
        Self {
            direction,
            dry_run: false,
            migrations_path: migrations_path.into(),
            target_migration: None,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target_migration = Some(target.into());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Reject configurations no batch can run with.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.migrations_path.as_os_str().is_empty() {
            return Err(MigrationError::InvalidConfig(
                "migrations path must not be empty".to_string(),
            ));
        }

        if let Some(target) = &self.target_migration {
            if target.trim().is_empty() {
                return Err(MigrationError::InvalidConfig(
                    "target migration must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Applied and pending migrations at one instant.
///
/// `applied` and `pending` partition the discovered files. Tracking rows
/// whose file is gone from disk are reported separately as `orphaned`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub applied: Vec<MigrationRecord>,
    pub pending: Vec<MigrationFile>,
    pub orphaned: Vec<MigrationRecord>,
}

/// Per-status counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[MigrationResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, r| {
            match r.status {
                MigrationStatus::Success => summary.succeeded += 1,
                MigrationStatus::Failed => summary.failed += 1,
                MigrationStatus::Skipped => summary.skipped += 1,
            }
            summary
        })
    }
}

/// One direction of a migration.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// Run against the schema handle; the surrounding transaction is
    /// committed only if this returns `Ok`.
    async fn run(&self, schema: &mut Schema<'_>) -> Result<(), MigrationError>;
}

/// A reversible migration written in Rust.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Apply the migration.
    async fn up(&self, schema: &mut Schema<'_>) -> Result<(), MigrationError>;

    /// Revert the migration.
    async fn down(&self, schema: &mut Schema<'_>) -> Result<(), MigrationError>;
}

struct UpStep<M>(Arc<M>);
struct DownStep<M>(Arc<M>);

#[async_trait]
impl<M: Migration> MigrationStep for UpStep<M> {
    async fn run(&self, schema: &mut Schema<'_>) -> Result<(), MigrationError> {
        self.0.up(schema).await
    }
}

#[async_trait]
impl<M: Migration> MigrationStep for DownStep<M> {
    async fn run(&self, schema: &mut Schema<'_>) -> Result<(), MigrationError> {
        self.0.down(schema).await
    }
}

/// The loaded form of a migration file: its `up` and `down` steps, either of
/// which may be missing.
#[derive(Clone, Default)]
pub struct MigrationModule {
    up: Option<Arc<dyn MigrationStep>>,
    down: Option<Arc<dyn MigrationStep>>,
}

impl MigrationModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Module exposing both directions of `migration`.
    pub fn reversible<M: Migration + 'static>(migration: M) -> Self {
        let migration = Arc::new(migration);
        Self {
            up: Some(Arc::new(UpStep(Arc::clone(&migration)))),
            down: Some(Arc::new(DownStep(migration))),
        }
    }

    pub fn with_up(mut self, step: impl MigrationStep + 'static) -> Self {
        self.up = Some(Arc::new(step));
        self
    }

    pub fn with_down(mut self, step: impl MigrationStep + 'static) -> Self {
        self.down = Some(Arc::new(step));
        self
    }

    /// The step for `direction`, if the module provides one.
    pub fn step(&self, direction: Direction) -> Option<Arc<dyn MigrationStep>> {
        match direction {
            Direction::Up => self.up.clone(),
            Direction::Down => self.down.clone(),
        }
    }

    pub fn has(&self, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.up.is_some(),
            Direction::Down => self.down.is_some(),
        }
    }
}

impl fmt::Debug for MigrationModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationModule")
            .field("up", &self.up.is_some())
            .field("down", &self.down.is_some())
            .finish()
    }
}
