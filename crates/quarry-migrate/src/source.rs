//! Migrations loaded from SQL files.
//!
//! A migration named `20240101120000_create_users` lives in
//! `20240101120000_create_users.up.sql` with an optional
//! `20240101120000_create_users.down.sql`. The timestamp prefix makes the
//! lexical order of names their chronological order.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use quarry_core::validate_identifier;
use quarry_db::{Connection, Schema};
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};
use crate::migration::Migration;

const UP_SUFFIX: &str = ".up.sql";
const DOWN_SUFFIX: &str = ".down.sql";

/// A migration whose steps are SQL scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFileMigration {
    name: String,
    up: String,
    down: Option<String>,
}

impl SqlFileMigration {
    /// Creates a migration from script text.
    #[must_use]
    pub fn new(name: impl Into<String>, up: impl Into<String>, down: Option<String>) -> Self {
        Self {
            name: name.into(),
            up: up.into(),
            down,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn up_sql(&self) -> &str {
        &self.up
    }

    #[must_use]
    pub fn down_sql(&self) -> Option<&str> {
        self.down.as_deref()
    }
}

impl<C: Connection> Migration<C> for SqlFileMigration {
    fn up<'a>(&'a self, schema: &'a Schema<'a, C>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            schema.execute_raw(&self.up).await?;
            Ok(())
        })
    }

    fn down<'a>(&'a self, schema: &'a Schema<'a, C>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let sql = self
                .down
                .as_deref()
                .ok_or_else(|| MigrateError::NotReversible(self.name.clone()))?;
            schema.execute_raw(sql).await?;
            Ok(())
        })
    }

    fn is_reversible(&self) -> bool {
        self.down.is_some()
    }
}

/// Loads every `*.up.sql` migration of a directory, sorted by name.
///
/// # Errors
///
/// Returns [`MigrateError::MigrationsDirNotFound`] if `dir` does not exist,
/// or an IO error if a file cannot be read.
pub fn load_sql_dir(dir: &Path) -> Result<Vec<SqlFileMigration>> {
    if !dir.is_dir() {
        return Err(MigrateError::MigrationsDirNotFound(dir.to_path_buf()));
    }

    let mut migrations = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if let Some(name) = file_name.strip_suffix(UP_SUFFIX) {
            let up = std::fs::read_to_string(&path)?;
            let down_path = dir.join(format!("{name}{DOWN_SUFFIX}"));
            let down = if down_path.is_file() {
                Some(std::fs::read_to_string(&down_path)?)
            } else {
                None
            };
            debug!(migration = %name, reversible = down.is_some(), "Loaded migration");
            migrations.push(SqlFileMigration::new(name, up, down));
        } else if let Some(name) = file_name.strip_suffix(DOWN_SUFFIX) {
            if !dir.join(format!("{name}{UP_SUFFIX}")).is_file() {
                warn!(file = %path.display(), "Down migration without an up migration, ignored");
            }
        }
    }
    migrations.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(migrations)
}

/// Creates empty up and down files for a new migration named
/// `<timestamp>_<name>` and returns their paths.
///
/// # Errors
///
/// Returns [`MigrateError::InvalidName`] if `name` is not a plain identifier
/// and [`MigrateError::MigrationExists`] if the up file is already there.
pub fn create_sql_migration(
    dir: &Path,
    name: &str,
    now: DateTime<Utc>,
) -> Result<(PathBuf, PathBuf)> {
    validate_identifier(name)?;
    let full_name = format!("{}_{name}", now.format("%Y%m%d%H%M%S"));
    let up = dir.join(format!("{full_name}{UP_SUFFIX}"));
    let down = dir.join(format!("{full_name}{DOWN_SUFFIX}"));
    if up.exists() {
        return Err(MigrateError::MigrationExists(up));
    }

    std::fs::create_dir_all(dir)?;
    std::fs::write(&up, format!("-- {full_name}: apply\n"))?;
    std::fs::write(&down, format!("-- {full_name}: revert\n"))?;
    Ok((up, down))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_load_sorts_and_pairs_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("002_posts.up.sql"), "create table posts (id integer)").unwrap();
        std::fs::write(dir.path().join("001_users.up.sql"), "create table users (id integer)").unwrap();
        std::fs::write(dir.path().join("001_users.down.sql"), "drop table users").unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let migrations = load_sql_dir(dir.path()).unwrap();
        let names: Vec<&str> = migrations.iter().map(SqlFileMigration::name).collect();
        assert_eq!(names, vec!["001_users", "002_posts"]);
        assert_eq!(migrations[0].down_sql(), Some("drop table users"));
        assert_eq!(migrations[1].down_sql(), None);
    }

    #[test]
    fn test_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_sql_dir(&dir.path().join("nope"));
        assert!(matches!(result, Err(MigrateError::MigrationsDirNotFound(_))));
    }

    #[test]
    fn test_create_sql_migration() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();

        let (up, down) = create_sql_migration(dir.path(), "create_users", now).unwrap();
        assert_eq!(
            up.file_name().unwrap().to_str().unwrap(),
            "20240301123005_create_users.up.sql"
        );
        assert!(down.exists());

        assert!(matches!(
            create_sql_migration(dir.path(), "create_users", now),
            Err(MigrateError::MigrationExists(_))
        ));
        assert!(matches!(
            create_sql_migration(dir.path(), "../escape", now),
            Err(MigrateError::InvalidName(_))
        ));

        let loaded = load_sql_dir(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name(), "20240301123005_create_users");
    }
}
