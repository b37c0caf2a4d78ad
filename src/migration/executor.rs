//! Migration executor for running one migration.

use super::resolver::MigrationResolver;
use super::schema::Schema;
use super::types::{Direction, MigrationError, MigrationResult, MigrationStep};
use crate::database::{Database, Transaction};
use crate::discovery::MigrationFile;
use crate::state::StateStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Executor for applying or reverting a single migration.
///
/// The migration body and the tracking-row change share one transaction:
/// either both commit or neither does.
pub struct MigrationExecutor {
    db: Arc<dyn Database>,
    store: Arc<StateStore>,
    resolver: Arc<dyn MigrationResolver>,
}

impl MigrationExecutor {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<StateStore>,
        resolver: Arc<dyn MigrationResolver>,
    ) -> Self {
        Self {
            db,
            store,
            resolver,
        }
    }

    /// Apply (`Up`) or revert (`Down`) `file`.
    ///
    /// Failures of the migration itself come back as a `Failed` result.
    /// `Err` is reserved for losing the database connection, after which no
    /// further migration could run anyway.
    pub async fn execute(
        &self,
        file: &MigrationFile,
        direction: Direction,
        dry_run: bool,
    ) -> Result<MigrationResult, MigrationError> {
        if dry_run {
            info!(migration = %file.filename, direction = %direction, "Dry run, not executing");
            return Ok(MigrationResult::skipped(direction, &file.filename));
        }

        info!(migration = %file.filename, direction = %direction, "Running migration");
        let started = Instant::now();

        let outcome = self.apply(file, direction).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                info!(
                    migration = %file.filename,
                    direction = %direction,
                    duration_ms,
                    "Migration succeeded"
                );
                Ok(MigrationResult::success(direction, &file.filename, duration_ms))
            }
            Err(e) if e.is_fatal() => {
                error!(migration = %file.filename, error = %e, "Lost database connection");
                Err(e)
            }
            Err(e) => {
                error!(
                    migration = %file.filename,
                    direction = %direction,
                    error = %e,
                    "Migration failed"
                );
                Ok(MigrationResult::failed(direction, &file.filename, duration_ms, e))
            }
        }
    }

    async fn apply(
        &self,
        file: &MigrationFile,
        direction: Direction,
    ) -> Result<(), MigrationError> {
        let module = self.resolver.resolve(file).await?;
        let step = module
            .step(direction)
            .ok_or_else(|| MigrationError::MissingStep {
                name: file.filename.clone(),
                direction,
            })?;

        let mut tx = self.db.begin().await?;

        match self.run_in_transaction(tx.as_mut(), step, file, direction).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        migration = %file.filename,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_in_transaction(
        &self,
        tx: &mut dyn Transaction,
        step: Arc<dyn MigrationStep>,
        file: &MigrationFile,
        direction: Direction,
    ) -> Result<(), MigrationError> {
        {
            let mut schema = Schema::new(&mut *tx, self.db.dialect());
            step.run(&mut schema).await.map_err(|e| {
                if e.is_fatal() {
                    e
                } else {
                    MigrationError::Execution(file.filename.clone(), e.to_string())
                }
            })?;
        }

        match direction {
            Direction::Up => self.store.record_in(tx, &file.filename).await?,
            Direction::Down => self.store.remove_in(tx, &file.filename).await?,
        }
        Ok(())
    }
}
