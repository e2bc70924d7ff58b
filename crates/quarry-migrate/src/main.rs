//! quarry-migrate CLI
//!
//! Command-line tool for applying and reverting SQL migrations.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use quarry_db::{AnyConnection, Connection, PoolConfig};
use quarry_migrate::{create_sql_migration, Migrator, RollbackScope};

/// Batch-tracked SQL migrations.
#[derive(Parser)]
#[command(name = "quarry-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (postgres://, mysql://, mariadb:// or sqlite:).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3?mode=rwc")]
    database: String,

    /// Migrations directory.
    #[arg(short, long, default_value = "migrations")]
    migrations_dir: PathBuf,

    /// Maximum pooled connections.
    #[arg(long, env = "QUARRY_MAX_CONNECTIONS", default_value_t = 2)]
    max_connections: u32,

    /// Seconds to wait for a pooled connection.
    #[arg(long, env = "QUARRY_ACQUIRE_TIMEOUT", default_value_t = 30)]
    acquire_timeout: u64,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations.
    Migrate {
        /// Roll back every migration, then apply them all again.
        #[arg(long)]
        refresh: bool,

        /// Run each migration inside a transaction.
        #[arg(long)]
        transactional: bool,

        #[command(subcommand)]
        action: Option<MigrateAction>,
    },

    /// Show which migrations are applied.
    Status {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Create empty up and down files for a new migration.
    Make {
        /// Migration name, e.g. `create_users`.
        name: String,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Revert the last batch.
    Rollback {
        /// Revert this many migrations instead of the last batch.
        #[arg(long, conflicts_with = "all")]
        steps: Option<u64>,

        /// Revert every applied migration.
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Make { name } = &cli.command {
        let (up, down) = create_sql_migration(&cli.migrations_dir, name, chrono::Utc::now())?;
        info!("Created migration: {}", up.display());
        info!("Created migration: {}", down.display());
        return Ok(());
    }

    let config = PoolConfig {
        max_connections: cli.max_connections,
        acquire_timeout_secs: cli.acquire_timeout,
        ..PoolConfig::default()
    };
    let conn = AnyConnection::open(&cli.database, &config)
        .await
        .with_context(|| format!("cannot open {}", cli.database))?;

    let mut migrator = Migrator::new(&conn);
    migrator.add_sql_dir(&cli.migrations_dir)?;

    let outcome = execute(&cli.command, &mut migrator).await;
    conn.disconnect().await?;
    outcome
}

async fn execute(
    command: &Commands,
    migrator: &mut Migrator<'_, AnyConnection>,
) -> anyhow::Result<()> {
    match command {
        Commands::Migrate {
            refresh,
            transactional,
            action,
        } => {
            migrator.transactional(*transactional);
            let report = match action {
                Some(MigrateAction::Rollback { steps, all }) => {
                    let scope = match (steps, all) {
                        (_, true) => RollbackScope::All,
                        (Some(steps), false) => RollbackScope::Steps(*steps),
                        (None, false) => RollbackScope::LastBatch,
                    };
                    migrator.rollback(scope).await?
                }
                None if *refresh => migrator.refresh().await?,
                None => migrator.run().await?,
            };
            if !report.is_empty() {
                info!(
                    "Done: {} applied, {} rolled back",
                    report.applied.len(),
                    report.rolled_back.len()
                );
            }
        }

        Commands::Status { json } => {
            let status = migrator.status().await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else if status.is_empty() {
                info!("No migrations found.");
            } else {
                println!("\nMigrations:");
                println!("{:-<60}", "");
                for migration in &status {
                    let mark = if migration.is_applied() { "X" } else { " " };
                    let batch = migration
                        .batch
                        .map_or_else(String::new, |batch| format!(" (batch {batch})"));
                    let missing = if migration.registered { "" } else { " [missing file]" };
                    println!(" [{mark}] {}{batch}{missing}", migration.name);
                }
                println!();
            }
        }

        Commands::Make { .. } => {}
    }
    Ok(())
}
