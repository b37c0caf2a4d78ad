use serde::Serialize;
use std::path::PathBuf;

/// A migration file found on disk. Identity is the filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationFile {
    pub filename: String,
    pub filepath: PathBuf,
    /// `YYYYMMDDHHMMSS` prefix of the filename
    pub timestamp: String,
}

impl MigrationFile {
    /// Filename without its extension.
    pub fn stem(&self) -> &str {
        self.filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.filename)
    }

    pub fn extension(&self) -> Option<&str> {
        self.filename.rsplit_once('.').map(|(_, ext)| ext)
    }

    /// Whether `name` designates this file, by full filename or by stem.
    pub fn matches(&self, name: &str) -> bool {
        self.filename == name || self.stem() == name
    }
}
