//! Error types for the migration runner.

use std::path::PathBuf;

use quarry_core::{BuildError, IdentifierError};
use quarry_db::DbError;

/// Errors that can occur while loading, applying or rolling back migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Two migrations were registered under one name.
    #[error("Migration '{0}' is registered twice")]
    DuplicateMigration(String),

    /// A recorded migration has no registered counterpart.
    #[error("Migration '{0}' is recorded but not registered")]
    MigrationNotFound(String),

    /// A migration has no `down` step.
    #[error("Migration '{0}' is not reversible")]
    NotReversible(String),

    /// A migration's `up` or `down` failed. Earlier migrations of the same
    /// run stay applied.
    #[error("Migration '{name}' failed: {source}")]
    Failed {
        /// The failing migration.
        name: String,
        /// What went wrong.
        #[source]
        source: Box<MigrateError>,
    },

    /// A migration name is not a plain identifier.
    #[error("Invalid migration name: {0}")]
    InvalidName(#[from] IdentifierError),

    /// A statement could not be compiled.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Error reported by the database.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// IO error (reading/writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration file already exists.
    #[error("Migration file already exists: {0}")]
    MigrationExists(PathBuf),

    /// No migrations directory found.
    #[error("Migrations directory not found: {0}")]
    MigrationsDirNotFound(PathBuf),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
