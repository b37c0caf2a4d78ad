//! Migration registry for migrations written in Rust.

use super::resolver::MigrationResolver;
use super::types::{Migration, MigrationError, MigrationModule};
use crate::discovery::MigrationFile;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Registry of code migrations, keyed by migration name.
///
/// A migration is registered under its filename or its filename without
/// extension; a discovered file is looked up by both. The files themselves
/// still have to exist on disk: discovery decides what runs, the registry
/// only supplies the code.
pub struct MigrationRegistry {
    migrations: BTreeMap<String, MigrationModule>,
}

impl MigrationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            migrations: BTreeMap::new(),
        }
    }

    /// Register a module under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, module: MigrationModule) {
        self.migrations.insert(name.into(), module);
    }

    /// Register a reversible migration under `name`.
    pub fn register_migration<M: Migration + 'static>(
        &mut self,
        name: impl Into<String>,
        migration: M,
    ) {
        self.register(name, MigrationModule::reversible(migration));
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<String> {
        self.migrations.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Module registered for `file`, by filename first, then by stem.
    pub fn get(&self, file: &MigrationFile) -> Option<&MigrationModule> {
        self.migrations
            .get(&file.filename)
            .or_else(|| self.migrations.get(file.stem()))
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MigrationResolver for MigrationRegistry {
    async fn resolve(&self, file: &MigrationFile) -> Result<MigrationModule, MigrationError> {
        self.get(file).cloned().ok_or_else(|| {
            MigrationError::Resolve(
                file.filename.clone(),
                "no migration registered under this name".to_string(),
            )
        })
    }
}
