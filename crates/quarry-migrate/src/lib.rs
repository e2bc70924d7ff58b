//! Batch-tracked schema migrations for quarry.
//!
//! A [`Migrator`] applies registered [`Migration`]s in name order and records
//! each one in a `migrations` table together with the batch (run) that
//! applied it. Rollbacks revert the most recent batch, a number of steps, or
//! everything.
//!
//! Names are expected to carry a sortable timestamp prefix such as
//! `20240101120000_create_users`, so name order is chronological order.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use quarry_db::{AnyConnection, PoolConfig};
//! use quarry_migrate::{Migrator, RollbackScope};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let conn = AnyConnection::open("sqlite:app.db?mode=rwc", &PoolConfig::default()).await?;
//!
//! let mut migrator = Migrator::new(&conn);
//! migrator.add_sql_dir(Path::new("migrations"))?;
//!
//! let report = migrator.run().await?;
//! println!("applied {} migration(s)", report.applied.len());
//!
//! migrator.rollback(RollbackScope::LastBatch).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create empty up/down files
//! quarry-migrate make create_users
//!
//! # Apply pending migrations
//! quarry-migrate migrate
//!
//! # Revert the last batch, or the last N migrations
//! quarry-migrate migrate rollback
//! quarry-migrate migrate rollback --steps 2
//!
//! # Revert everything and apply again
//! quarry-migrate migrate --refresh
//!
//! # Show which migrations are applied
//! quarry-migrate status
//! ```

pub mod error;
pub mod history;
pub mod migration;
pub mod runner;
pub mod source;

pub use error::{MigrateError, Result};
pub use history::{MigrationHistory, MigrationRecord, MIGRATIONS_TABLE};
pub use migration::Migration;
pub use runner::{MigrationReport, MigrationStatus, Migrator, RollbackScope};
pub use source::{create_sql_migration, load_sql_dir, SqlFileMigration};
