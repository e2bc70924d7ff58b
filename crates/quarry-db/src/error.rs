//! Error types for database execution.

use std::time::Duration;

use quarry_core::{BuildError, IdentifierError, TokenizeError};
use thiserror::Error;

/// Errors raised while executing statements.
#[derive(Debug, Error)]
pub enum DbError {
    /// The statement could not be compiled.
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// An administrative identifier was rejected.
    #[error("invalid identifier: {0}")]
    Identifier(#[from] IdentifierError),

    /// A raw script could not be split into statements.
    #[error("cannot split script: {0}")]
    Tokenize(#[from] TokenizeError),

    /// Error reported by the driver.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error (SQLite database files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// No pooled client became available in time.
    #[error("timed out after {0:?} waiting for a pooled connection")]
    AcquireTimeout(Duration),

    /// `commit` or `rollback` without `begin_transaction`.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// `begin_transaction` while a transaction is already open.
    #[error("a transaction is already active on this connection")]
    TransactionAlreadyActive,

    /// The driver cannot bind this value.
    #[error("cannot bind {0}")]
    UnsupportedBinding(String),

    /// A result column has a type that cannot be decoded.
    #[error("cannot decode column '{column}' of type {type_name}")]
    UnsupportedColumnType {
        /// Column name.
        column: String,
        /// Driver type name.
        type_name: String,
    },

    /// The connection URL names no supported driver.
    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),

    /// The cursor was already closed.
    #[error("cursor is closed")]
    CursorClosed,

    /// The operation needs a live connection.
    #[error("not connected")]
    NotConnected,
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DbError>;
