//! Batch orchestration: planning, sequential execution and status reports.

use super::executor::MigrationExecutor;
use super::resolver::MigrationResolver;
use super::types::{
    BatchSummary, Direction, MigrationError, MigrationResult, MigrationRunConfig, StatusReport,
};
use crate::config::MigratorConfig;
use crate::database::Database;
use crate::discovery::{Discovery, MigrationFile};
use crate::state::{MigrationRecord, StateStore};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives batches of migrations against one database.
///
/// Runners hold no global state; several can run side by side against
/// different databases or tracking tables. Nothing prevents two runners
/// from applying the same pending migration concurrently against the same
/// database.
pub struct MigrationRunner {
    store: Arc<StateStore>,
    executor: MigrationExecutor,
    discovery: Discovery,
}

impl MigrationRunner {
    /// Runner with the default tracking table and lenient discovery.
    pub fn new(db: Arc<dyn Database>, resolver: Arc<dyn MigrationResolver>) -> Self {
        Self::from_config(db, resolver, &MigratorConfig::default())
    }

    /// Runner using the tracking table and discovery settings of `config`.
    pub fn from_config(
        db: Arc<dyn Database>,
        resolver: Arc<dyn MigrationResolver>,
        config: &MigratorConfig,
    ) -> Self {
        let store = Arc::new(StateStore::with_table(
            Arc::clone(&db),
            config.table_name.clone(),
        ));
        let discovery = Discovery::new()
            .with_extensions(config.extensions.iter().cloned())
            .strict(config.strict_discovery);

        Self {
            executor: MigrationExecutor::new(db, Arc::clone(&store), resolver),
            store,
            discovery,
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.store
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// Run one `up` or `down` batch.
    ///
    /// Migrations run strictly one after another and the batch stops at the
    /// first failure, so the applied set stays a prefix of the sorted
    /// discovered list.
    pub async fn run_batch(
        &self,
        config: &MigrationRunConfig,
    ) -> Result<Vec<MigrationResult>, MigrationError> {
        config.validate()?;

        info!(
            direction = %config.direction,
            dry_run = config.dry_run,
            path = %config.migrations_path.display(),
            "Planning migration batch"
        );

        let discovered = self.discovery.discover(&config.migrations_path).await?;
        let applied = self.store.list_applied().await?;
        let target = config.target_migration.as_deref();

        let candidates = match config.direction {
            Direction::Up => plan_up(&discovered, &applied, target),
            Direction::Down => plan_down(&discovered, &applied, target),
        };

        if candidates.is_empty() {
            info!(direction = %config.direction, "No migrations to run");
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(candidates.len());
        for file in candidates {
            let result = self
                .executor
                .execute(file, config.direction, config.dry_run)
                .await?;
            let failed = result.is_failed();
            results.push(result);

            if failed {
                warn!(
                    migration = %file.filename,
                    "Stopping batch after failed migration"
                );
                break;
            }
        }

        let summary = BatchSummary::from_results(&results);
        info!(
            direction = %config.direction,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Migration batch finished"
        );

        Ok(results)
    }

    /// Roll back, then re-apply.
    ///
    /// Runs a `down` batch and then an `up` batch with the same path,
    /// dry-run flag and target; `config.direction` is ignored. The two
    /// phases are separate batches: a failed `down` does not prevent the
    /// `up` phase, and a crash in between leaves the migration rolled back.
    pub async fn redo(
        &self,
        config: &MigrationRunConfig,
    ) -> Result<Vec<MigrationResult>, MigrationError> {
        let mut results = self
            .run_batch(&config.clone().with_direction(Direction::Down))
            .await?;

        if results.iter().any(MigrationResult::is_failed) {
            warn!("Rollback phase of redo failed, running the up phase anyway");
        }

        let up = self
            .run_batch(&config.clone().with_direction(Direction::Up))
            .await?;
        results.extend(up);
        Ok(results)
    }

    /// Applied and pending migrations for `migrations_path`. Performs no
    /// writes beyond creating the tracking table if it is missing.
    pub async fn status(&self, migrations_path: &Path) -> Result<StatusReport, MigrationError> {
        let discovered = self.discovery.discover(migrations_path).await?;
        let records = self.store.list_applied().await?;

        let on_disk: HashSet<&str> = discovered.iter().map(|f| f.filename.as_str()).collect();
        let (applied, orphaned): (Vec<MigrationRecord>, Vec<MigrationRecord>) = records
            .into_iter()
            .partition(|r| on_disk.contains(r.name.as_str()));

        let applied_names: HashSet<&str> = applied.iter().map(|r| r.name.as_str()).collect();
        let pending = discovered
            .iter()
            .filter(|f| !applied_names.contains(f.filename.as_str()))
            .cloned()
            .collect();

        Ok(StatusReport {
            applied,
            pending,
            orphaned,
        })
    }
}

/// Pending files in ascending order, cut after `target` when it is pending.
fn plan_up<'a>(
    discovered: &'a [MigrationFile],
    applied: &[MigrationRecord],
    target: Option<&str>,
) -> Vec<&'a MigrationFile> {
    let applied_names: HashSet<&str> = applied.iter().map(|r| r.name.as_str()).collect();
    let mut pending: Vec<&MigrationFile> = discovered
        .iter()
        .filter(|f| !applied_names.contains(f.filename.as_str()))
        .collect();

    if let Some(target) = target {
        match pending.iter().position(|f| f.matches(target)) {
            Some(index) => pending.truncate(index + 1),
            None => warn!(
                target = %target,
                "Target migration is not pending, running all pending migrations"
            ),
        }
    }

    pending
}

/// Applied files still on disk, newest first: only the newest one, or every
/// one matching `target`.
fn plan_down<'a>(
    discovered: &'a [MigrationFile],
    applied: &[MigrationRecord],
    target: Option<&str>,
) -> Vec<&'a MigrationFile> {
    let on_disk: HashSet<&str> = discovered.iter().map(|f| f.filename.as_str()).collect();
    for record in applied.iter().filter(|r| !on_disk.contains(r.name.as_str())) {
        warn!(migration = %record.name, "Applied migration has no file on disk, ignoring");
    }

    let applied_names: HashSet<&str> = applied.iter().map(|r| r.name.as_str()).collect();
    let applied_in_order = discovered
        .iter()
        .rev()
        .filter(|f| applied_names.contains(f.filename.as_str()));

    match target {
        None => applied_in_order.take(1).collect(),
        Some(target) => {
            let matching: Vec<&MigrationFile> =
                applied_in_order.filter(|f| f.matches(target)).collect();
            if matching.is_empty() {
                warn!(target = %target, "Target migration is not applied");
            }
            matching
        }
    }
}
