//! Enumerate candidate migrations from a directory.
//!
//! A migration file is named `<14-digit timestamp>-<slug>.<ext>`, for example
//! `20240115093000-add-user-index.sql`. Files are returned sorted by their
//! timestamp prefix, which is fixed width, so a string sort is chronological.

mod types;

pub use types::MigrationFile;

use crate::utils::DEFAULT_EXTENSIONS;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// `<timestamp>-<slug>.<ext>`, capturing the timestamp and the extension.
static MIGRATION_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{14})-[A-Za-z0-9_-]+\.([A-Za-z0-9]+)$")
        .expect("migration file pattern is valid")
});

/// Error types for directory scanning.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Migrations directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("Failed to read migrations directory {0}: {1}")]
    Unreadable(PathBuf, String),
}

/// Directory scanner for migration files.
#[derive(Debug, Clone)]
pub struct Discovery {
    extensions: Vec<String>,
    strict: bool,
}

impl Discovery {
    /// Scanner accepting the default extensions, lenient about missing
    /// directories.
    pub fn new() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            strict: false,
        }
    }

    /// Replace the accepted file extensions (without the leading dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_string())
            .collect();
        self
    }

    /// In strict mode a missing or unreadable directory is an error instead
    /// of an empty result.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Timestamp prefix of `filename` if it is a migration file name with an
    /// accepted extension.
    pub fn match_filename(&self, filename: &str) -> Option<String> {
        let captures = MIGRATION_FILE_PATTERN.captures(filename)?;
        let extension = captures.get(2)?.as_str();

        if !self.extensions.iter().any(|e| e == extension) {
            return None;
        }

        captures.get(1).map(|m| m.as_str().to_string())
    }

    /// List the migration files in `path`, sorted ascending by timestamp.
    pub async fn discover(&self, path: &Path) -> Result<Vec<MigrationFile>, DiscoveryError> {
        if !path.is_dir() {
            if self.strict {
                return Err(DiscoveryError::MissingDirectory(path.to_path_buf()));
            }
            error!(path = %path.display(), "Migrations directory not found");
            return Ok(Vec::new());
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    if self.strict {
                        return Err(DiscoveryError::Unreadable(
                            path.to_path_buf(),
                            e.to_string(),
                        ));
                    }
                    error!(path = %path.display(), error = %e, "Failed to read directory entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().to_string();
            match self.match_filename(&filename) {
                Some(timestamp) => files.push(MigrationFile {
                    filepath: entry.path().to_path_buf(),
                    filename,
                    timestamp,
                }),
                None => debug!(file = %filename, "Ignoring non-migration file"),
            }
        }

        // Directory order is unspecified; make ties deterministic before the
        // stable timestamp sort.
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        files.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        warn_duplicate_timestamps(&files);

        Ok(files)
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new()
    }
}

/// Lenient discovery with the default extensions.
///
/// A missing directory is logged and yields an empty list.
pub async fn discover(path: &Path) -> Vec<MigrationFile> {
    match Discovery::new().discover(path).await {
        Ok(files) => files,
        Err(e) => {
            error!(error = %e, "Migration discovery failed");
            Vec::new()
        }
    }
}

fn warn_duplicate_timestamps(files: &[MigrationFile]) {
    let mut seen = HashSet::new();
    for file in files {
        if !seen.insert(file.timestamp.as_str()) {
            warn!(
                timestamp = %file.timestamp,
                file = %file.filename,
                "Several migrations share a timestamp"
            );
        }
    }
}
