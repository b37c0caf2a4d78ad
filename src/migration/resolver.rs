//! Turning discovered files into loaded migration modules.

use super::schema::Schema;
use super::types::{MigrationError, MigrationModule, MigrationStep};
use crate::discovery::MigrationFile;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::fs;

/// `-- up` / `-- down` section markers, case-insensitive.
static SECTION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*--\s*(up|down)\b").expect("section marker pattern is valid")
});

/// Loads the code behind a migration file.
#[async_trait]
pub trait MigrationResolver: Send + Sync {
    /// Load `file` into a module. Whether the module provides the direction
    /// being run is checked by the executor, not here.
    async fn resolve(&self, file: &MigrationFile) -> Result<MigrationModule, MigrationError>;
}

/// A SQL script run as one migration step.
#[derive(Debug, Clone)]
pub struct SqlScript(pub String);

#[async_trait]
impl MigrationStep for SqlScript {
    async fn run(&self, schema: &mut Schema<'_>) -> Result<(), MigrationError> {
        schema.execute_script(&self.0).await
    }
}

/// Resolver for plain SQL migration files.
///
/// The file is split on `-- up` and `-- down` marker lines. A file without a
/// `-- down` marker has no down step, so reverting it fails validation.
#[derive(Debug, Clone, Default)]
pub struct SqlFileResolver;

impl SqlFileResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MigrationResolver for SqlFileResolver {
    async fn resolve(&self, file: &MigrationFile) -> Result<MigrationModule, MigrationError> {
        let content = fs::read_to_string(&file.filepath)
            .await
            .map_err(|e| MigrationError::Resolve(file.filename.clone(), e.to_string()))?;

        parse_sql_sections(&content)
            .map_err(|reason| MigrationError::Resolve(file.filename.clone(), reason))
    }
}

/// Split a SQL migration into its up and down scripts.
///
/// Comments and blank lines may precede the first marker; any statement
/// outside a section is rejected.
pub fn parse_sql_sections(content: &str) -> Result<MigrationModule, String> {
    let mut up: Option<Vec<&str>> = None;
    let mut down: Option<Vec<&str>> = None;
    let mut current: Option<&str> = None;

    for (index, line) in content.lines().enumerate() {
        if let Some(captures) = SECTION_MARKER.captures(line) {
            let section = if captures[1].eq_ignore_ascii_case("up") {
                up.get_or_insert_with(Vec::new);
                "up"
            } else {
                down.get_or_insert_with(Vec::new);
                "down"
            };
            current = Some(section);
            continue;
        }

        match current {
            Some("up") => up.get_or_insert_with(Vec::new).push(line),
            Some(_) => down.get_or_insert_with(Vec::new).push(line),
            None => {
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with("--") {
                    return Err(format!(
                        "line {} is outside any -- up / -- down section",
                        index + 1
                    ));
                }
            }
        }
    }

    let mut module = MigrationModule::new();
    if let Some(lines) = up {
        module = module.with_up(SqlScript(lines.join("\n").trim().to_string()));
    }
    if let Some(lines) = down {
        module = module.with_down(SqlScript(lines.join("\n").trim().to_string()));
    }
    Ok(module)
}

/// Dispatches to a resolver chosen by file extension.
#[derive(Clone, Default)]
pub struct ExtensionResolver {
    resolvers: HashMap<String, Arc<dyn MigrationResolver>>,
}

impl ExtensionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route files ending in `.{extension}` to `resolver`.
    pub fn with(mut self, extension: &str, resolver: Arc<dyn MigrationResolver>) -> Self {
        self.resolvers
            .insert(extension.trim_start_matches('.').to_string(), resolver);
        self
    }
}

#[async_trait]
impl MigrationResolver for ExtensionResolver {
    async fn resolve(&self, file: &MigrationFile) -> Result<MigrationModule, MigrationError> {
        let extension = file.extension().unwrap_or_default();
        match self.resolvers.get(extension) {
            Some(resolver) => resolver.resolve(file).await,
            None => Err(MigrationError::Resolve(
                file.filename.clone(),
                format!("no resolver registered for .{} files", extension),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::types::Direction;

    #[test]
    fn test_parse_both_sections() {
        let module = parse_sql_sections(concat!(
            "-- create users\n",
            "-- up\nCREATE TABLE users (id INTEGER);\n\n",
            "-- down\nDROP TABLE users;\n",
        ))
        .unwrap();
        assert!(module.has(Direction::Up));
        assert!(module.has(Direction::Down));
    }

    #[test]
    fn test_parse_missing_down_section() {
        let module = parse_sql_sections("-- Up migration\nCREATE TABLE t (id INTEGER);").unwrap();
        assert!(module.has(Direction::Up));
        assert!(!module.has(Direction::Down));
    }

    #[test]
    fn test_marker_requires_word_boundary() {
        let module = parse_sql_sections("-- up\n-- update the index\nSELECT 1;").unwrap();
        assert!(module.has(Direction::Up));
        assert!(!module.has(Direction::Down));
    }

    #[test]
    fn test_statement_before_marker_rejected() {
        let result = parse_sql_sections("CREATE TABLE t (id INTEGER);\n-- up\n");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sql_file_resolver_reads_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("20240101000000-a.sql");
        fs::write(&path, "-- up\nSELECT 1;\n-- down\nSELECT 2;\n")
            .await
            .unwrap();

        let file = MigrationFile {
            filename: "20240101000000-a.sql".to_string(),
            filepath: path,
            timestamp: "20240101000000".to_string(),
        };
        let module = SqlFileResolver::new().resolve(&file).await.unwrap();
        assert!(module.has(Direction::Down));
    }

    #[tokio::test]
    async fn test_extension_resolver_unknown_extension() {
        let resolver = ExtensionResolver::new().with("sql", Arc::new(SqlFileResolver::new()));
        let file = MigrationFile {
            filename: "20240101000000-a.rs".to_string(),
            filepath: "20240101000000-a.rs".into(),
            timestamp: "20240101000000".to_string(),
        };
        let result = resolver.resolve(&file).await;
        assert!(matches!(result, Err(MigrationError::Resolve(_, _))));
    }
}
