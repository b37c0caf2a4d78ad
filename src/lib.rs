pub mod config;
pub mod database;
pub mod discovery;
pub mod migration;
pub mod state;
pub mod template;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, read_config, ConfigError, MigratorConfig};
pub use database::{
    connect, Database, DatabaseError, Dialect, PostgresDatabase, SqliteDatabase, Transaction,
};
pub use discovery::{discover, Discovery, DiscoveryError, MigrationFile};
pub use migration::{
    default_resolver, BatchSummary, Direction, ExtensionResolver, Migration, MigrationError,
    MigrationExecutor, MigrationModule, MigrationRegistry, MigrationResolver, MigrationResult,
    MigrationRunConfig, MigrationRunner, MigrationStatus, MigrationStep, Schema, SqlFileResolver,
    StatusReport,
};
pub use state::{MigrationRecord, StateStore, TrackingError};
pub use template::{create_migration, TemplateEngine, TemplateError, TemplateKind};
