#![allow(dead_code)]

use schema_migrator::SqliteDatabase;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create the `migrations` folder inside `root`
pub fn create_migrations_dir(root: &Path) -> PathBuf {
    let dir = root.join("migrations");
    std::fs::create_dir_all(&dir).expect("Failed to create migrations dir");
    dir
}

/// Open a file-backed SQLite database inside `root`
pub async fn open_test_db(root: &Path) -> Arc<SqliteDatabase> {
    let db = SqliteDatabase::open(&root.join("test.db"))
        .await
        .expect("Failed to open test database");
    Arc::new(db)
}

/// Write a SQL migration with `-- up` / `-- down` sections
pub fn write_sql_migration(dir: &Path, filename: &str, up: &str, down: &str) -> PathBuf {
    let path = dir.join(filename);
    std::fs::write(&path, format!("-- up\n{}\n\n-- down\n{}\n", up, down))
        .expect("Failed to write migration");
    path
}

/// Write a file verbatim
pub fn write_file(dir: &Path, filename: &str, content: &str) -> PathBuf {
    let path = dir.join(filename);
    std::fs::write(&path, content).expect("Failed to write file");
    path
}

/// Names of the tables in a SQLite database
pub async fn table_names(db: &SqliteDatabase) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(db.pool())
    .await
    .expect("Failed to list tables")
}
