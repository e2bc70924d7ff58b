//! A connection chosen at runtime from a database URL.

use quarry_core::{CompiledSql, Dialect};
use tokio::sync::broadcast;

use crate::config::PoolConfig;
use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::{DbError, Result};
use crate::event::ConnectionEvent;
use crate::mysql::MySqlConnection;
use crate::postgres::PostgresConnection;
use crate::row::QueryResult;
use crate::sqlite::SqliteConnection;

/// Any of the supported connections.
#[derive(Debug, Clone)]
pub enum AnyConnection {
    Postgres(PostgresConnection),
    MySql(MySqlConnection),
    Sqlite(SqliteConnection),
}

macro_rules! dispatch {
    ($self:ident, $conn:ident => $body:expr) => {
        match $self {
            AnyConnection::Postgres($conn) => $body,
            AnyConnection::MySql($conn) => $body,
            AnyConnection::Sqlite($conn) => $body,
        }
    };
}

/// Picks the dialect from a URL scheme.
///
/// # Errors
///
/// Returns [`DbError::UnsupportedUrl`] for any other scheme.
pub fn dialect_for_url(url: &str) -> Result<Dialect> {
    let scheme = url.split(':').next().unwrap_or_default();
    match scheme {
        "postgres" | "postgresql" => Ok(Dialect::Postgres),
        "mysql" | "mariadb" => Ok(Dialect::MySql),
        "sqlite" => Ok(Dialect::Sqlite),
        _ => Err(DbError::UnsupportedUrl(url.to_string())),
    }
}

impl AnyConnection {
    /// Builds a pool for `url` with the driver its scheme names.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnsupportedUrl`] for an unknown scheme, or the
    /// driver error if the pool cannot be created.
    pub async fn open(url: &str, config: &PoolConfig) -> Result<Self> {
        Ok(match dialect_for_url(url)? {
            Dialect::Postgres => Self::Postgres(PostgresConnection::open(url, config).await?),
            Dialect::MySql => Self::MySql(MySqlConnection::open(url, config).await?),
            Dialect::Sqlite => Self::Sqlite(SqliteConnection::open(url, config).await?),
        })
    }
}

impl From<PostgresConnection> for AnyConnection {
    fn from(conn: PostgresConnection) -> Self {
        Self::Postgres(conn)
    }
}

impl From<MySqlConnection> for AnyConnection {
    fn from(conn: MySqlConnection) -> Self {
        Self::MySql(conn)
    }
}

impl From<SqliteConnection> for AnyConnection {
    fn from(conn: SqliteConnection) -> Self {
        Self::Sqlite(conn)
    }
}

impl Connection for AnyConnection {
    fn dialect(&self) -> Dialect {
        dispatch!(self, conn => conn.dialect())
    }

    fn supports_server_cursor(&self) -> bool {
        dispatch!(self, conn => conn.supports_server_cursor())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        dispatch!(self, conn => conn.subscribe())
    }

    async fn connect(&self) -> Result<()> {
        dispatch!(self, conn => conn.connect().await)
    }

    async fn disconnect(&self) -> Result<()> {
        dispatch!(self, conn => conn.disconnect().await)
    }

    async fn is_connected(&self) -> bool {
        dispatch!(self, conn => conn.is_connected().await)
    }

    async fn in_transaction(&self) -> bool {
        dispatch!(self, conn => conn.in_transaction().await)
    }

    async fn run_query(&self, compiled: &CompiledSql) -> Result<QueryResult> {
        dispatch!(self, conn => conn.run_query(compiled).await)
    }

    async fn run_cursor(&self, compiled: &CompiledSql, batch_size: usize) -> Result<Cursor> {
        dispatch!(self, conn => conn.run_cursor(compiled, batch_size).await)
    }

    async fn begin_transaction(&self) -> Result<()> {
        dispatch!(self, conn => conn.begin_transaction().await)
    }

    async fn commit(&self) -> Result<()> {
        dispatch!(self, conn => conn.commit().await)
    }

    async fn rollback(&self) -> Result<()> {
        dispatch!(self, conn => conn.rollback().await)
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        dispatch!(self, conn => conn.create_database(name).await)
    }

    async fn drop_database(&self, name: &str) -> Result<()> {
        dispatch!(self, conn => conn.drop_database(name).await)
    }
}
