use crate::utils::{CONFIG_FILE, DEFAULT_EXTENSIONS, DEFAULT_MIGRATIONS_PATH, DEFAULT_TABLE_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

fn default_migrations_path() -> PathBuf {
    PathBuf::from(DEFAULT_MIGRATIONS_PATH)
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

/// Migrator configuration, read from `migrator.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratorConfig {
    /// Directory scanned for migration files
    #[serde(default = "default_migrations_path")]
    pub migrations_path: PathBuf,
    /// Tracking table; may be schema-qualified (`audit.schema_migrations`)
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// File extensions treated as migrations, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Fail instead of finding nothing when the migrations directory is missing
    #[serde(default)]
    pub strict_discovery: bool,
    /// Directory holding custom `sql.hbs` / `rust.hbs` templates for new migrations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_path: Option<PathBuf>,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            migrations_path: default_migrations_path(),
            table_name: default_table_name(),
            extensions: default_extensions(),
            strict_discovery: false,
            templates_path: None,
        }
    }
}

/// Read `migrator.json` from `project_path`
pub async fn read_config(project_path: &Path) -> Result<Option<MigratorConfig>, ConfigError> {
    load_config(&project_path.join(CONFIG_FILE)).await
}

/// Read a configuration file; `None` if it does not exist
pub async fn load_config(config_path: &Path) -> Result<Option<MigratorConfig>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(config_path).await?;
    let config: MigratorConfig = serde_json::from_str(&content)?;
    Ok(Some(config))
}
