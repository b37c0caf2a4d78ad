//! Migration engine.
//!
//! Applies and reverts timestamped migrations against a database while
//! keeping a tracking table of what has been applied.
//!
//! # Overview
//!
//! - Migration files are found on disk by [`Discovery`](crate::discovery::Discovery)
//! - A [`MigrationResolver`] loads a file into a [`MigrationModule`] with
//!   optional `up` and `down` steps
//! - The [`MigrationExecutor`] runs one step and updates the tracking table
//!   inside the same transaction
//! - The [`MigrationRunner`] plans batches, runs them in order and stops at
//!   the first failure
//!
//! # Usage
//!
//! ```ignore
//! let db = database::connect("sqlite://app.db").await?;
//! let runner = MigrationRunner::new(db, Arc::new(SqlFileResolver::new()));
//! let results = runner
//!     .run_batch(&MigrationRunConfig::new(Direction::Up, "migrations"))
//!     .await?;
//! ```

mod executor;
mod registry;
mod resolver;
mod runner;
mod schema;
mod types;

pub use executor::MigrationExecutor;
pub use registry::MigrationRegistry;
pub use resolver::{
    parse_sql_sections, ExtensionResolver, MigrationResolver, SqlFileResolver, SqlScript,
};
pub use runner::MigrationRunner;
pub use schema::{ColumnDef, ColumnType, Schema, TableBuilder};
pub use types::{
    BatchSummary, Direction, Migration, MigrationError, MigrationModule, MigrationResult,
    MigrationRunConfig, MigrationStatus, MigrationStep, StatusReport,
};

use std::sync::Arc;

/// Resolver used when migrations are plain SQL files.
///
/// `.sql` files are split into `-- up` / `-- down` sections; any other
/// extension fails to resolve.
pub fn default_resolver() -> Arc<dyn MigrationResolver> {
    Arc::new(ExtensionResolver::new().with("sql", Arc::new(SqlFileResolver::new())))
}
