mod engine;
mod types;

pub use engine::{slugify, TemplateEngine, TemplateError};
pub use types::{MigrationTemplateContext, TemplateKind};

use std::path::{Path, PathBuf};

/// Create a migration from the built-in templates
pub async fn create_migration(
    migrations_path: &Path,
    name: &str,
    kind: TemplateKind,
) -> Result<PathBuf, TemplateError> {
    TemplateEngine::new()
        .create_migration(migrations_path, name, kind)
        .await
}
