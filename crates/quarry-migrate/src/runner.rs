//! Applying and rolling back migrations.
//!
//! Each `run` applies every pending migration in name order under one new
//! batch number. A failure stops the run; the migrations that completed
//! before it stay applied and recorded.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use quarry_db::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::history::MigrationHistory;
use crate::migration::Migration;
use crate::source::load_sql_dir;

/// Which applied migrations a rollback reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackScope {
    /// Every migration of the most recent batch.
    #[default]
    LastBatch,
    /// The given number of most recent migrations.
    Steps(u64),
    /// Everything.
    All,
}

/// What a run or rollback did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Batch number of the applied migrations, if any were applied.
    pub batch: Option<i64>,
    /// Migrations applied, in order.
    pub applied: Vec<String>,
    /// Migrations rolled back, in order.
    pub rolled_back: Vec<String>,
}

impl MigrationReport {
    /// Returns true if nothing was applied or rolled back.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty() && self.rolled_back.is_empty()
    }
}

/// The state of one migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Migration name.
    pub name: String,
    /// Batch that applied it, `None` while pending.
    pub batch: Option<i64>,
    /// Whether it is registered with the migrator. Recorded migrations whose
    /// files were deleted are listed with `false`.
    pub registered: bool,
}

impl MigrationStatus {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        self.batch.is_some()
    }
}

/// Runs migrations against a connection.
pub struct Migrator<'c, C: Connection> {
    conn: &'c C,
    history: MigrationHistory<'c, C>,
    migrations: BTreeMap<String, Box<dyn Migration<C>>>,
    transactional: bool,
}

impl<'c, C: Connection> Migrator<'c, C> {
    /// Creates a migrator with no migrations.
    pub fn new(conn: &'c C) -> Self {
        Self {
            conn,
            history: MigrationHistory::new(conn),
            migrations: BTreeMap::new(),
            transactional: false,
        }
    }

    /// Wraps each migration and its tracking write in one transaction.
    ///
    /// Statements the database commits implicitly (DDL on MySQL) are not
    /// covered.
    pub fn transactional(&mut self, enabled: bool) -> &mut Self {
        self.transactional = enabled;
        self
    }

    /// Registers a migration under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::DuplicateMigration`] if the name is taken.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        migration: impl Migration<C> + 'static,
    ) -> Result<&mut Self> {
        let name = name.into();
        if self.migrations.contains_key(&name) {
            return Err(MigrateError::DuplicateMigration(name));
        }
        self.migrations.insert(name, Box::new(migration));
        Ok(self)
    }

    /// Registers every SQL migration found in `dir`.
    ///
    /// # Errors
    ///
    /// See [`load_sql_dir`] and [`Migrator::add`].
    pub fn add_sql_dir(&mut self, dir: &Path) -> Result<&mut Self> {
        for migration in load_sql_dir(dir)? {
            let name = migration.name().to_string();
            self.add(name, migration)?;
        }
        Ok(self)
    }

    /// Returns the registered names, in the order they apply.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.migrations.keys().map(String::as_str)
    }

    /// Applies every pending migration as one new batch.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Failed`] naming the migration that failed.
    /// Migrations applied before it stay recorded.
    pub async fn run(&self) -> Result<MigrationReport> {
        self.history.ensure_table().await?;
        let recorded: HashSet<String> = self
            .history
            .recorded()
            .await?
            .into_iter()
            .map(|record| record.filename)
            .collect();

        let pending: Vec<(&String, &dyn Migration<C>)> = self
            .migrations
            .iter()
            .filter(|(name, _)| !recorded.contains(*name))
            .map(|(name, migration)| (name, migration.as_ref()))
            .collect();
        if pending.is_empty() {
            info!("No migrations to run");
            return Ok(MigrationReport::default());
        }

        let batch = self.history.last_batch().await? + 1;
        let mut report = MigrationReport {
            batch: Some(batch),
            ..MigrationReport::default()
        };
        for (name, migration) in pending {
            info!(migration = %name, batch, "Migrating");
            self.apply(name, migration, batch)
                .await
                .map_err(|err| failed(name, err))?;
            info!(migration = %name, "Migrated");
            report.applied.push(name.clone());
        }
        info!(count = report.applied.len(), batch, "Applied migrations");
        Ok(report)
    }

    /// Reverts applied migrations, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MigrationNotFound`] or
    /// [`MigrateError::NotReversible`] before anything is reverted if a
    /// selected migration cannot be rolled back, and [`MigrateError::Failed`]
    /// if a `down` step fails.
    pub async fn rollback(&self, scope: RollbackScope) -> Result<MigrationReport> {
        self.history.ensure_table().await?;
        let records = match scope {
            RollbackScope::LastBatch => {
                let batch = self.history.last_batch().await?;
                self.history.newest_first(Some(batch), None).await?
            }
            RollbackScope::Steps(steps) => self.history.newest_first(None, Some(steps)).await?,
            RollbackScope::All => self.history.newest_first(None, None).await?,
        };
        if records.is_empty() {
            info!("Nothing to roll back");
            return Ok(MigrationReport::default());
        }

        let mut targets = Vec::with_capacity(records.len());
        for record in &records {
            let migration = self
                .migrations
                .get(&record.filename)
                .ok_or_else(|| MigrateError::MigrationNotFound(record.filename.clone()))?;
            if !migration.is_reversible() {
                return Err(MigrateError::NotReversible(record.filename.clone()));
            }
            targets.push((&record.filename, migration.as_ref()));
        }

        let mut report = MigrationReport::default();
        for (name, migration) in targets {
            info!(migration = %name, "Rolling back");
            self.revert(name, migration)
                .await
                .map_err(|err| failed(name, err))?;
            info!(migration = %name, "Rolled back");
            report.rolled_back.push(name.clone());
        }
        info!(count = report.rolled_back.len(), "Rolled back migrations");
        Ok(report)
    }

    /// Rolls back everything, then applies everything as one batch.
    ///
    /// # Errors
    ///
    /// See [`Migrator::rollback`] and [`Migrator::run`].
    pub async fn refresh(&self) -> Result<MigrationReport> {
        let rolled_back = self.rollback(RollbackScope::All).await?.rolled_back;
        let mut report = self.run().await?;
        report.rolled_back = rolled_back;
        Ok(report)
    }

    /// Lists registered and recorded migrations in name order.
    ///
    /// # Errors
    ///
    /// Returns the database error if the history cannot be read.
    pub async fn status(&self) -> Result<Vec<MigrationStatus>> {
        self.history.ensure_table().await?;
        let mut batches: BTreeMap<String, Option<i64>> =
            self.migrations.keys().map(|name| (name.clone(), None)).collect();
        for record in self.history.recorded().await? {
            batches.insert(record.filename, Some(record.batch));
        }
        Ok(batches
            .into_iter()
            .map(|(name, batch)| MigrationStatus {
                registered: self.migrations.contains_key(&name),
                name,
                batch,
            })
            .collect())
    }

    async fn apply(&self, name: &str, migration: &dyn Migration<C>, batch: i64) -> Result<()> {
        self.begin().await?;
        let result = async {
            let schema = self.conn.schema();
            migration.up(&schema).await?;
            self.history.record(name, batch).await
        }
        .await;
        self.finish(result).await
    }

    async fn revert(&self, name: &str, migration: &dyn Migration<C>) -> Result<()> {
        self.begin().await?;
        let result = async {
            let schema = self.conn.schema();
            migration.down(&schema).await?;
            if !self.history.remove(name).await? {
                warn!(migration = %name, "Tracking row already gone");
            }
            Ok::<_, MigrateError>(())
        }
        .await;
        self.finish(result).await
    }

    async fn begin(&self) -> Result<()> {
        if self.transactional {
            debug!("Opening migration transaction");
            self.conn.begin_transaction().await?;
        }
        Ok(())
    }

    async fn finish(&self, result: Result<()>) -> Result<()> {
        if !self.transactional {
            return result;
        }
        match result {
            Ok(()) => {
                self.conn.commit().await?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback) = self.conn.rollback().await {
                    warn!(error = %rollback, "Rolling back failed migration failed");
                }
                Err(err)
            }
        }
    }
}

fn failed(name: &str, err: MigrateError) -> MigrateError {
    MigrateError::Failed {
        name: name.to_string(),
        source: Box::new(err),
    }
}
