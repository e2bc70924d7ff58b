//! SQLite driver.
//!
//! Arrays are bound as JSON text, for use with `json_each`. A "database" is a
//! file `<name>.sqlite3` under the connection's database directory. Cursors
//! buffer the whole result.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use quarry_core::{validate_identifier, CompiledSql, Dialect, Parameter};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::{Column as _, Connection as _, Row as _, Sqlite, TypeInfo as _, ValueRef as _};
use tokio::sync::broadcast;
use tracing::info;

use crate::config::PoolConfig;
use crate::connection::Connection;
use crate::convert::{array_to_json, bytes_to_text, unbindable_expression};
use crate::cursor::Cursor;
use crate::error::{DbError, Result};
use crate::event::{ConnectionEvent, EventBus};
use crate::row::{QueryResult, Row};
use crate::session::SessionHandle;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// A SQLite connection.
#[derive(Clone)]
pub struct SqliteConnection {
    handle: SessionHandle<Sqlite>,
    database_dir: PathBuf,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("database_dir", &self.database_dir)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Wraps an existing pool. No client is acquired until first use.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_acquire_timeout(pool, PoolConfig::default().acquire_timeout())
    }

    /// Wraps an existing pool, reporting `timeout` when acquisition fails.
    #[must_use]
    pub fn with_acquire_timeout(pool: SqlitePool, timeout: Duration) -> Self {
        Self {
            handle: SessionHandle::new(pool, timeout, EventBus::new(Dialect::Sqlite)),
            database_dir: PathBuf::from("."),
        }
    }

    /// Builds a pool for `url` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the pool cannot be created.
    pub async fn open(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = config.options::<Sqlite>().connect(url).await?;
        Ok(Self::with_acquire_timeout(pool, config.acquire_timeout()))
    }

    /// Sets the directory that `create_database` and `drop_database` use.
    #[must_use]
    pub fn with_database_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.database_dir = dir.into();
        self
    }

    #[must_use]
    pub fn database_dir(&self) -> &Path {
        &self.database_dir
    }

    /// Returns the file backing database `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Identifier`] if `name` is not a plain identifier.
    pub fn database_path(&self, name: &str) -> Result<PathBuf> {
        validate_identifier(name)?;
        Ok(self.database_dir.join(format!("{name}.sqlite3")))
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.handle.events().subscribe()
    }

    async fn connect(&self) -> Result<()> {
        self.handle.connect().await
    }

    async fn disconnect(&self) -> Result<()> {
        self.handle.disconnect().await
    }

    async fn is_connected(&self) -> bool {
        self.handle.is_connected().await
    }

    async fn in_transaction(&self) -> bool {
        self.handle.in_transaction().await
    }

    async fn run_query(&self, compiled: &CompiledSql) -> Result<QueryResult> {
        let started = Instant::now();
        let result = async {
            let mut session = self.handle.lock().await;
            let client = session.client().await?;
            execute(client, compiled).await
        }
        .await;
        self.handle
            .record(compiled.sql(), compiled.bindings(), started, result)
    }

    async fn run_cursor(&self, compiled: &CompiledSql, _batch_size: usize) -> Result<Cursor> {
        let result = self.run_query(compiled).await?;
        Ok(Cursor::buffered(result.rows))
    }

    async fn begin_transaction(&self) -> Result<()> {
        self.handle.begin().await
    }

    async fn commit(&self) -> Result<()> {
        self.handle.commit().await
    }

    async fn rollback(&self) -> Result<()> {
        self.handle.rollback().await
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        let path = self.handle.observe(self.database_path(name))?;
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let result = async {
            let conn = sqlx::sqlite::SqliteConnection::connect_with(&options).await?;
            conn.close().await?;
            Ok::<_, DbError>(())
        }
        .await;
        self.handle.observe(result)?;
        info!(path = %path.display(), "Created database");
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> Result<()> {
        let path = self.handle.observe(self.database_path(name))?;
        self.handle
            .observe(tokio::fs::remove_file(&path).await.map_err(DbError::from))?;
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(suffix);
            match tokio::fs::remove_file(&sidecar).await {
                Err(err) if err.kind() != ErrorKind::NotFound => {
                    return self.handle.observe(Err(err.into()));
                }
                _ => {}
            }
        }
        info!(path = %path.display(), "Dropped database");
        Ok(())
    }
}

async fn execute(
    client: &mut sqlx::sqlite::SqliteConnection,
    compiled: &CompiledSql,
) -> Result<QueryResult> {
    let mut query = sqlx::query(compiled.sql());
    for value in compiled.bindings() {
        query = bind(query, value)?;
    }
    if compiled.returns_rows() {
        let rows = query.fetch_all(client).await?;
        let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
        let mut result = QueryResult::from_rows(rows);
        result.collect_ids(compiled.returning());
        Ok(result)
    } else {
        let done = query.execute(client).await?;
        Ok(QueryResult {
            rows_affected: done.rows_affected(),
            ..QueryResult::default()
        })
    }
}

fn bind<'q>(query: SqliteQuery<'q>, value: &Parameter) -> Result<SqliteQuery<'q>> {
    Ok(match value {
        Parameter::Null => query.bind(None::<i64>),
        Parameter::Bool(value) => query.bind(*value),
        Parameter::Int(value) => query.bind(*value),
        Parameter::Float(value) => query.bind(*value),
        Parameter::Text(value) => query.bind(value.clone()),
        Parameter::Date(value) => query.bind(*value),
        Parameter::Array(values) => query.bind(array_to_json(values)?),
        Parameter::Expression(expr) => return Err(unbindable_expression(expr.sql())),
    })
}

/// Decodes by the storage class of each value, not the declared column type.
fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Parameter::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => Parameter::Int(row.try_get_unchecked(index)?),
                "REAL" => Parameter::Float(row.try_get_unchecked(index)?),
                "BLOB" => bytes_to_text(
                    column.name(),
                    column.type_info().name(),
                    row.try_get_unchecked(index)?,
                )?,
                _ => Parameter::Text(row.try_get_unchecked(index)?),
            }
        };
        columns.push(column.name().to_string());
        values.push(value);
    }
    Ok(Row::new(columns, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn connection() -> SqliteConnection {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        SqliteConnection::new(pool)
    }

    #[tokio::test]
    async fn test_decodes_storage_classes() {
        let conn = connection().await;
        let compiled = CompiledSql::raw(
            "select 1 as i, 1.5 as f, 'x' as t, null as n, x'6869' as b",
            quarry_core::StatementKind::Select,
        );
        let result = conn.run_query(&compiled).await.unwrap();
        let row = &result.rows[0];
        assert_eq!(row.get("i"), Some(&Parameter::Int(1)));
        assert_eq!(row.get("f"), Some(&Parameter::Float(1.5)));
        assert_eq!(row.get("t"), Some(&Parameter::Text("x".into())));
        assert_eq!(row.get("n"), Some(&Parameter::Null));
        assert_eq!(row.get("b"), Some(&Parameter::Text("hi".into())));
    }

    #[tokio::test]
    async fn test_array_binds_as_json() {
        let conn = connection().await;
        let mut writer = quarry_core::SqlWriter::new();
        writer
            .push("select count(*) as count from json_each(")
            .bind(&Parameter::Array(vec![Parameter::Int(1), Parameter::Int(2)]))
            .unwrap()
            .push(")");
        let compiled = writer.finish(quarry_core::StatementKind::Select);

        let result = conn.run_query(&compiled).await.unwrap();
        assert_eq!(result.rows[0].get_i64("count"), Some(2));
    }

    #[tokio::test]
    async fn test_database_path_is_validated() {
        let conn = connection().await.with_database_dir("/tmp/quarry");
        assert_eq!(
            conn.database_path("app").unwrap(),
            PathBuf::from("/tmp/quarry/app.sqlite3")
        );
        assert!(matches!(
            conn.database_path("app; drop table x"),
            Err(DbError::Identifier(_))
        ));
    }
}
