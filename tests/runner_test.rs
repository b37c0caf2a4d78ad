mod common;

use async_trait::async_trait;
use common::{
    create_migrations_dir, create_test_dir, open_test_db, table_names, write_file,
    write_sql_migration,
};
use schema_migrator::migration::{ColumnDef, ColumnType};
use schema_migrator::{
    default_resolver, Database, DatabaseError, Dialect, Direction, ExtensionResolver, Migration,
    MigrationError, MigrationRecord, MigrationRegistry, MigrationResolver, MigrationRunConfig,
    MigrationRunner, MigrationStatus, MigratorConfig, Schema, SqlFileResolver, StateStore,
    StatusReport, Transaction,
};
use std::path::Path;
use std::sync::Arc;

fn up(path: &Path) -> MigrationRunConfig {
    MigrationRunConfig::new(Direction::Up, path)
}

fn down(path: &Path) -> MigrationRunConfig {
    MigrationRunConfig::new(Direction::Down, path)
}

fn applied_names(report: &StatusReport) -> Vec<String> {
    report.applied.iter().map(|r| r.name.clone()).collect()
}

fn pending_names(report: &StatusReport) -> Vec<String> {
    report.pending.iter().map(|f| f.filename.clone()).collect()
}

/// Migration creating (and dropping) a one-column table
fn write_table_migration(migrations: &Path, filename: &str, table: &str) {
    write_sql_migration(
        migrations,
        filename,
        &format!("CREATE TABLE {} (id INTEGER);", table),
        &format!("DROP TABLE {};", table),
    );
}

fn write_users_and_index(migrations: &Path) {
    write_sql_migration(
        migrations,
        "20240101000000-create-users.sql",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL);",
        "DROP TABLE users;",
    );
    write_sql_migration(
        migrations,
        "20240102000000-add-index.sql",
        "CREATE INDEX idx_users_email ON users (email);",
        "DROP INDEX idx_users_email;",
    );
}

#[tokio::test]
async fn test_up_rerun_down_status_scenario() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_users_and_index(&migrations);

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db.clone(), default_resolver());

    // 1. Apply both, in file order
    let results = runner.run_batch(&up(&migrations)).await.expect("up batch");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].migration_name, "20240101000000-create-users.sql");
    assert_eq!(results[1].migration_name, "20240102000000-add-index.sql");
    assert!(results.iter().all(|r| r.status == MigrationStatus::Success));
    assert!(results.iter().all(|r| r.direction == Direction::Up));

    // 2. Nothing left to apply
    let results = runner.run_batch(&up(&migrations)).await.expect("rerun");
    assert!(results.is_empty());

    // 3. Default rollback only reverts the newest
    let results = runner.run_batch(&down(&migrations)).await.expect("down batch");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].migration_name, "20240102000000-add-index.sql");
    assert_eq!(results[0].status, MigrationStatus::Success);
    assert_eq!(results[0].direction, Direction::Down);

    // 4. Status reflects the rollback
    let report = runner.status(&migrations).await.expect("status");
    assert_eq!(
        applied_names(&report),
        vec!["20240101000000-create-users.sql"]
    );
    assert_eq!(pending_names(&report), vec!["20240102000000-add-index.sql"]);
    assert!(report.orphaned.is_empty());

    assert!(table_names(&db).await.contains(&"users".to_string()));
}

#[tokio::test]
async fn test_files_run_in_timestamp_order() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    // Written out of order on purpose
    write_table_migration(&migrations, "20240103000000-c.sql", "c");
    write_table_migration(&migrations, "20240101000000-a.sql", "a");
    write_table_migration(&migrations, "20240102000000-b.sql", "b");
    write_file(&migrations, "README.md", "not a migration");
    write_file(&migrations, "helper.sql", "SELECT 1;");

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db, default_resolver());

    let results = runner.run_batch(&up(&migrations)).await.unwrap();
    let names: Vec<&str> = results.iter().map(|r| r.migration_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["20240101000000-a.sql", "20240102000000-b.sql", "20240103000000-c.sql"]
    );
}

#[tokio::test]
async fn test_failure_stops_batch() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_table_migration(&migrations, "20240101000000-a.sql", "a");
    write_sql_migration(
        &migrations,
        "20240102000000-broken.sql",
        "CREATE TABLE oops (;",
        "SELECT 1;",
    );
    write_table_migration(&migrations, "20240103000000-c.sql", "c");

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db.clone(), default_resolver());

    let results = runner.run_batch(&up(&migrations)).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status, MigrationStatus::Success);
    assert_eq!(results[1].status, MigrationStatus::Failed);
    assert_eq!(results[1].migration_name, "20240102000000-broken.sql");
    assert!(matches!(results[1].error, Some(MigrationError::Execution(_, _))));

    let report = runner.status(&migrations).await.unwrap();
    assert_eq!(applied_names(&report), vec!["20240101000000-a.sql"]);
    assert_eq!(
        pending_names(&report),
        vec!["20240102000000-broken.sql", "20240103000000-c.sql"]
    );

    let tables = table_names(&db).await;
    assert!(!tables.contains(&"c".to_string()));
    assert!(!tables.contains(&"oops".to_string()));
}

#[tokio::test]
async fn test_failed_migration_leaves_no_partial_changes() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_sql_migration(
        &migrations,
        "20240101000000-half.sql",
        "CREATE TABLE half (id INTEGER);\nINSERT INTO nowhere VALUES (1);",
        "DROP TABLE half;",
    );

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db.clone(), default_resolver());

    let results = runner.run_batch(&up(&migrations)).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].is_failed());

    assert!(!table_names(&db).await.contains(&"half".to_string()));
    assert!(runner.state().list_applied().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_users_and_index(&migrations);

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db.clone(), default_resolver());

    let results = runner
        .run_batch(&up(&migrations).dry_run(true))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == MigrationStatus::Skipped));
    assert!(results.iter().all(|r| r.duration_ms == 0 && r.error.is_none()));

    assert!(runner.state().list_applied().await.unwrap().is_empty());
    assert!(!table_names(&db).await.contains(&"users".to_string()));

    // Dry-run down reports the newest applied migration without reverting it
    runner.run_batch(&up(&migrations)).await.unwrap();
    let results = runner
        .run_batch(&down(&migrations).dry_run(true))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, MigrationStatus::Skipped);
    assert_eq!(runner.state().list_applied().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_up_to_target() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_table_migration(&migrations, "20240101000000-a.sql", "a");
    write_table_migration(&migrations, "20240102000000-b.sql", "b");
    write_table_migration(&migrations, "20240103000000-c.sql", "c");

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db, default_resolver());

    // Stem is accepted as well as the full filename
    let results = runner
        .run_batch(&up(&migrations).target("20240102000000-b"))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);

    let report = runner.status(&migrations).await.unwrap();
    assert_eq!(pending_names(&report), vec!["20240103000000-c.sql"]);

    // A target that is no longer pending does not cut the batch short
    let results = runner
        .run_batch(&up(&migrations).target("20240101000000-a.sql"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].migration_name, "20240103000000-c.sql");
    assert_eq!(results[0].status, MigrationStatus::Success);
}

#[tokio::test]
async fn test_down_target_reverts_only_that_migration() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_table_migration(&migrations, "20240101000000-a.sql", "a");
    write_table_migration(&migrations, "20240102000000-b.sql", "b");

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db.clone(), default_resolver());
    runner.run_batch(&up(&migrations)).await.unwrap();

    let results = runner
        .run_batch(&down(&migrations).target("20240101000000-a.sql"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].migration_name, "20240101000000-a.sql");

    let report = runner.status(&migrations).await.unwrap();
    assert_eq!(applied_names(&report), vec!["20240102000000-b.sql"]);
    let tables = table_names(&db).await;
    assert!(!tables.contains(&"a".to_string()));
    assert!(tables.contains(&"b".to_string()));
}

#[tokio::test]
async fn test_unknown_target_runs_all_pending() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_users_and_index(&migrations);

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db, default_resolver());

    let results = runner
        .run_batch(&up(&migrations).target("20990101000000-nope"))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == MigrationStatus::Success));
    assert_eq!(runner.state().list_applied().await.unwrap().len(), 2);

    // Down with an unmatched target reverts nothing
    let results = runner
        .run_batch(&down(&migrations).target("20990101000000-nope"))
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(runner.state().list_applied().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_down_with_nothing_applied() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_users_and_index(&migrations);

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db, default_resolver());

    assert!(runner.run_batch(&down(&migrations)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_down_section_fails_rollback() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_file(
        &migrations,
        "20240101000000-one-way.sql",
        "-- up\nCREATE TABLE one_way (id INTEGER);\n",
    );

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db, default_resolver());
    runner.run_batch(&up(&migrations)).await.unwrap();

    let results = runner.run_batch(&down(&migrations)).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].is_failed());
    let error = results[0].error.as_ref().unwrap();
    assert!(matches!(
        error,
        MigrationError::MissingStep {
            direction: Direction::Down,
            ..
        }
    ));
    assert_eq!(
        error.to_string(),
        "Migration 20240101000000-one-way.sql is missing down() export"
    );

    // Still recorded as applied
    assert_eq!(runner.state().list_applied().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_redo_reverts_and_reapplies() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_users_and_index(&migrations);

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db, default_resolver());
    runner.run_batch(&up(&migrations)).await.unwrap();

    let results = runner.redo(&up(&migrations)).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].direction, Direction::Down);
    assert_eq!(results[0].migration_name, "20240102000000-add-index.sql");
    assert_eq!(results[1].direction, Direction::Up);
    assert_eq!(results[1].migration_name, "20240102000000-add-index.sql");
    assert!(results.iter().all(|r| r.status == MigrationStatus::Success));

    let report = runner.status(&migrations).await.unwrap();
    assert_eq!(report.applied.len(), 2);
    assert!(report.pending.is_empty());
}

#[tokio::test]
async fn test_redo_runs_up_phase_after_failed_rollback() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_sql_migration(
        &migrations,
        "20240101000000-a.sql",
        "CREATE TABLE a (id INTEGER);",
        "DROP TABLE does_not_exist;",
    );

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db.clone(), default_resolver());
    runner.run_batch(&up(&migrations)).await.unwrap();

    // Added after the first batch, so still pending
    write_sql_migration(
        &migrations,
        "20240102000000-b.sql",
        "CREATE TABLE b (id INTEGER);",
        "DROP TABLE b;",
    );

    let results = runner.redo(&up(&migrations)).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].direction, Direction::Down);
    assert_eq!(results[0].migration_name, "20240101000000-a.sql");
    assert!(results[0].is_failed());
    assert_eq!(results[1].direction, Direction::Up);
    assert_eq!(results[1].migration_name, "20240102000000-b.sql");
    assert_eq!(results[1].status, MigrationStatus::Success);

    let report = runner.status(&migrations).await.unwrap();
    assert_eq!(
        applied_names(&report),
        vec!["20240101000000-a.sql", "20240102000000-b.sql"]
    );
    assert!(table_names(&db).await.contains(&"b".to_string()));
}

#[tokio::test]
async fn test_missing_directory_is_lenient_by_default() {
    let temp_dir = create_test_dir();
    let missing = temp_dir.path().join("no-such-dir");

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db, default_resolver());

    assert!(runner.run_batch(&up(&missing)).await.unwrap().is_empty());
    let report = runner.status(&missing).await.unwrap();
    assert!(report.applied.is_empty() && report.pending.is_empty());
}

#[tokio::test]
async fn test_missing_directory_fails_when_strict() {
    let temp_dir = create_test_dir();
    let missing = temp_dir.path().join("no-such-dir");

    let db = open_test_db(temp_dir.path()).await;
    let config = MigratorConfig {
        strict_discovery: true,
        ..Default::default()
    };
    let runner = MigrationRunner::from_config(db, default_resolver(), &config);

    let result = runner.run_batch(&up(&missing)).await;
    assert!(matches!(result, Err(MigrationError::Discovery(_))));
}

#[tokio::test]
async fn test_orphaned_records_are_reported_separately() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_users_and_index(&migrations);

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db, default_resolver());
    runner.run_batch(&up(&migrations)).await.unwrap();

    std::fs::remove_file(migrations.join("20240102000000-add-index.sql")).unwrap();

    let report = runner.status(&migrations).await.unwrap();
    assert_eq!(
        applied_names(&report),
        vec!["20240101000000-create-users.sql"]
    );
    assert!(report.pending.is_empty());
    assert_eq!(report.orphaned.len(), 1);
    assert_eq!(report.orphaned[0].name, "20240102000000-add-index.sql");

    // Rollback skips the orphan and reverts the newest file still on disk
    let results = runner.run_batch(&down(&migrations)).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].migration_name, "20240101000000-create-users.sql");
}

#[tokio::test]
async fn test_custom_tracking_table() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_users_and_index(&migrations);

    let db = open_test_db(temp_dir.path()).await;
    let config = MigratorConfig {
        table_name: "app_migrations".to_string(),
        ..Default::default()
    };
    let runner = MigrationRunner::from_config(db.clone(), default_resolver(), &config);
    runner.run_batch(&up(&migrations)).await.unwrap();

    let tables = table_names(&db).await;
    assert!(tables.contains(&"app_migrations".to_string()));
    assert!(!tables.contains(&"schema_migrations".to_string()));

    // A runner on the default table sees nothing applied
    let other = StateStore::new(db.clone());
    assert!(other.list_applied().await.unwrap().is_empty());
}

struct CreatePosts;

#[async_trait]
impl Migration for CreatePosts {
    async fn up(&self, schema: &mut Schema<'_>) -> Result<(), MigrationError> {
        schema
            .create_table("posts", |t| {
                t.id("id").string("title", 200).text("body").timestamps();
            })
            .await?;
        schema
            .add_column("posts", ColumnDef::new("published", ColumnType::Boolean))
            .await?;
        schema.create_index("posts", &["title"], None).await
    }

    async fn down(&self, schema: &mut Schema<'_>) -> Result<(), MigrationError> {
        schema.drop_table("posts").await
    }
}

#[tokio::test]
async fn test_code_migrations_alongside_sql() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_table_migration(&migrations, "20240101000000-a.sql", "a");
    write_file(&migrations, "20240102000000-create-posts.rs", "// compiled into the binary\n");

    let mut registry = MigrationRegistry::new();
    registry.register_migration("20240102000000-create-posts", CreatePosts);

    let resolver: Arc<dyn MigrationResolver> = Arc::new(
        ExtensionResolver::new()
            .with("sql", Arc::new(SqlFileResolver::new()))
            .with("rs", Arc::new(registry)),
    );
    let config = MigratorConfig {
        extensions: vec!["sql".to_string(), "rs".to_string()],
        ..Default::default()
    };

    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::from_config(db.clone(), resolver, &config);

    let results = runner.run_batch(&up(&migrations)).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == MigrationStatus::Success));
    assert!(table_names(&db).await.contains(&"posts".to_string()));

    let results = runner.run_batch(&down(&migrations)).await.unwrap();
    assert_eq!(results[0].migration_name, "20240102000000-create-posts.rs");
    assert!(!table_names(&db).await.contains(&"posts".to_string()));
}

#[tokio::test]
async fn test_independent_runners_do_not_share_state() {
    let first_dir = create_test_dir();
    let second_dir = create_test_dir();
    let migrations = create_migrations_dir(first_dir.path());
    write_users_and_index(&migrations);

    let first = MigrationRunner::new(open_test_db(first_dir.path()).await, default_resolver());
    let second = MigrationRunner::new(open_test_db(second_dir.path()).await, default_resolver());

    first.run_batch(&up(&migrations)).await.unwrap();

    let report = second.status(&migrations).await.unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.pending.len(), 2);
}

#[tokio::test]
async fn test_empty_migrations_path_is_invalid() {
    let temp_dir = create_test_dir();
    let db = open_test_db(temp_dir.path()).await;
    let runner = MigrationRunner::new(db, default_resolver());

    let result = runner.run_batch(&up(Path::new(""))).await;
    assert!(matches!(result, Err(MigrationError::InvalidConfig(_))));
}

/// Database whose connection drops as soon as a transaction is opened
struct DroppedConnection;

#[async_trait]
impl Database for DroppedConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, _sql: &str, _params: &[&str]) -> Result<u64, DatabaseError> {
        Ok(0)
    }

    async fn fetch_records(&self, _sql: &str) -> Result<Vec<MigrationRecord>, DatabaseError> {
        Ok(Vec::new())
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, DatabaseError> {
        Err(DatabaseError::Connection("connection reset by peer".to_string()))
    }
}

#[tokio::test]
async fn test_lost_connection_aborts_batch() {
    let temp_dir = create_test_dir();
    let migrations = create_migrations_dir(temp_dir.path());
    write_users_and_index(&migrations);

    let runner = MigrationRunner::new(Arc::new(DroppedConnection), default_resolver());

    let result = runner.run_batch(&up(&migrations)).await;
    match result {
        Err(MigrationError::Database(e)) => assert!(e.is_connection()),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(results) => panic!("expected an error, got {} results", results.len()),
    }
}
