use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use schema_migrator::{
    connect, default_resolver, load_config, BatchSummary, Direction, MigrationResult,
    MigrationRunConfig, MigrationRunner, MigrationStatus, MigratorConfig, StatusReport,
    TemplateEngine, TemplateKind,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Schema migrator - apply and revert timestamped database migrations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database connection URL (sqlite://app.db, postgres://...)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Directory holding migration files; overrides the config file
    #[arg(long, env = "MIGRATIONS_PATH", global = true)]
    migrations_path: Option<PathBuf>,

    /// Tracking table name; overrides the config file
    #[arg(long, global = true)]
    table: Option<String>,

    /// Path to the JSON config file
    #[arg(long, default_value = "migrator.json", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations
    Up(RunArgs),
    /// Revert the most recent migration, or the given target
    Down(RunArgs),
    /// Revert and re-apply
    Redo(RunArgs),
    /// Show applied and pending migrations
    Status,
    /// Create a new migration file
    Create {
        /// Human readable name, turned into the file slug
        name: String,

        #[arg(long, value_enum, default_value_t = Kind::Sql)]
        kind: Kind,
    },
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// Plan the batch without touching the database
    #[arg(long)]
    dry_run: bool,

    /// Migration filename (or filename without extension) to stop at
    #[arg(long)]
    target: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Sql,
    Rust,
}

impl From<Kind> for TemplateKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Sql => TemplateKind::Sql,
            Kind::Rust => TemplateKind::Rust,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = load_config(&args.config)
        .await
        .with_context(|| format!("reading {}", args.config.display()))?
        .unwrap_or_default();
    if let Some(path) = args.migrations_path {
        config.migrations_path = path;
    }
    if let Some(table) = args.table {
        config.table_name = table;
    }

    let database_url = args.database_url.as_deref();
    match args.command {
        Command::Create { name, kind } => {
            let path = TemplateEngine::new()
                .with_templates_path(config.templates_path.clone())
                .create_migration(&config.migrations_path, &name, kind.into())
                .await?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Status => {
            let runner = runner(database_url, &config).await?;
            let report = runner.status(&config.migrations_path).await?;
            print_status(&report);
            Ok(())
        }
        Command::Up(run) => batch(database_url, &config, Direction::Up, run, false).await,
        Command::Down(run) => batch(database_url, &config, Direction::Down, run, false).await,
        Command::Redo(run) => batch(database_url, &config, Direction::Down, run, true).await,
    }
}

async fn runner(
    database_url: Option<&str>,
    config: &MigratorConfig,
) -> anyhow::Result<MigrationRunner> {
    let Some(url) = database_url else {
        bail!("no database URL; pass --database-url or set DATABASE_URL");
    };
    let db = connect(url).await.context("connecting to database")?;
    Ok(MigrationRunner::from_config(db, default_resolver(), config))
}

async fn batch(
    database_url: Option<&str>,
    config: &MigratorConfig,
    direction: Direction,
    run: RunArgs,
    redo: bool,
) -> anyhow::Result<()> {
    let runner = runner(database_url, config).await?;

    let mut run_config =
        MigrationRunConfig::new(direction, config.migrations_path.clone()).dry_run(run.dry_run);
    if let Some(target) = run.target {
        run_config = run_config.target(target);
    }

    let results = if redo {
        runner.redo(&run_config).await?
    } else {
        runner.run_batch(&run_config).await?
    };

    if results.is_empty() {
        info!("Nothing to do");
    }
    for result in &results {
        print_result(result);
    }

    let summary = BatchSummary::from_results(&results);
    if summary.failed > 0 {
        bail!("{} migration(s) failed", summary.failed);
    }
    Ok(())
}

fn print_result(result: &MigrationResult) {
    let label = match result.status {
        MigrationStatus::Success => "ok",
        MigrationStatus::Failed => "FAILED",
        MigrationStatus::Skipped => "skipped",
    };
    match &result.error {
        Some(error) => println!(
            "{:>4} {:<8} {} ({} ms): {}",
            result.direction, label, result.migration_name, result.duration_ms, error
        ),
        None => println!(
            "{:>4} {:<8} {} ({} ms)",
            result.direction, label, result.migration_name, result.duration_ms
        ),
    }
}

fn print_status(report: &StatusReport) {
    println!("Applied ({}):", report.applied.len());
    for record in &report.applied {
        println!("  {}  {}", record.applied_at.to_rfc3339(), record.name);
    }
    println!("Pending ({}):", report.pending.len());
    for file in &report.pending {
        println!("  {}", file.filename);
    }
    if !report.orphaned.is_empty() {
        println!("Applied but missing on disk ({}):", report.orphaned.len());
        for record in &report.orphaned {
            println!("  {}", record.name);
        }
    }
}
