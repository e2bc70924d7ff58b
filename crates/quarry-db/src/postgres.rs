//! PostgreSQL driver.
//!
//! Placeholders are numbered (`$1`, `$2`, ...). `NULL` bindings are written
//! into the statement text instead of being bound, so an untyped null never
//! has to be inferred by the server. Cursors are real server-side cursors
//! declared inside a transaction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use quarry_core::{CompiledSql, Dialect, Parameter};
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::{Column as _, Executor as _, Postgres, Row as _, TypeInfo as _, ValueRef as _};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::connection::{database_statement, Connection};
use crate::convert::unbindable_expression;
use crate::cursor::Cursor;
use crate::error::{DbError, Result};
use crate::event::{ConnectionEvent, EventBus};
use crate::row::{QueryResult, Row};
use crate::session::{Session, SessionHandle};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

/// A PostgreSQL connection.
#[derive(Clone)]
pub struct PostgresConnection {
    handle: SessionHandle<Postgres>,
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection").finish_non_exhaustive()
    }
}

impl PostgresConnection {
    /// Wraps an existing pool. No client is acquired until first use.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_acquire_timeout(pool, PoolConfig::default().acquire_timeout())
    }

    /// Wraps an existing pool, reporting `timeout` when acquisition fails.
    #[must_use]
    pub fn with_acquire_timeout(pool: PgPool, timeout: Duration) -> Self {
        Self {
            handle: SessionHandle::new(pool, timeout, EventBus::new(Dialect::Postgres)),
        }
    }

    /// Builds a pool for `url` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the pool cannot be created.
    pub async fn open(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = config.options::<Postgres>().connect(url).await?;
        Ok(Self::with_acquire_timeout(pool, config.acquire_timeout()))
    }

    /// Publishes the statement as the server received it: nulls inlined and
    /// only the remaining values bound.
    fn record<T>(
        &self,
        sql: &str,
        bound: &[&Parameter],
        started: Instant,
        result: Result<T>,
    ) -> Result<T> {
        self.handle.record(sql, bound.iter().copied(), started, result)
    }
}

impl Connection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn supports_server_cursor(&self) -> bool {
        true
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
        let (sql, bindings) = render(compiled);
        let started = Instant::now();
        let result = async {
            let mut session = self.handle.lock().await;
            let client = session.client().await?;
            execute(client, &sql, &bindings, compiled).await
        }
        .await;
        self.record(&sql, &bindings, started, result)
    }

    async fn run_cursor(&self, compiled: &CompiledSql, batch_size: usize) -> Result<Cursor> {
        let (sql, bindings) = render(compiled);
        let started = Instant::now();
        let result = async {
            let mut session = self.handle.lock().await;
            let seq = session.open_cursor().await?;
            let name = format!("quarry_cursor_{seq}");
            let declare = format!("declare {name} no scroll cursor for {sql}");
            let declared = async {
                let client = session.client().await?;
                bind_all(sqlx::query(&declare), &bindings)?
                    .execute(client)
                    .await?;
                Ok::<_, DbError>(())
            }
            .await;
            if let Err(err) = declared {
                if let Err(release) = session.release_cursor().await {
                    warn!(error = %release, "Failed to release cursor after declare error");
                }
                return Err(err);
            }
            Ok(name)
        }
        .await;
        let name = self.record(&sql, &bindings, started, result)?;
        debug!(cursor = %name, batch_size, "Declared server cursor");
        Ok(Cursor::server(ServerCursor {
            session: self.handle.shared(),
            name,
            batch_size: batch_size.max(1),
            exhausted: false,
            closed: false,
        }))
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
        let compiled = self
            .handle
            .observe(database_statement(self.schema_grammar().as_ref(), name, true))?;
        self.run_query(&compiled).await.map(drop)
    }

    async fn drop_database(&self, name: &str) -> Result<()> {
        let compiled = self
            .handle
            .observe(database_statement(self.schema_grammar().as_ref(), name, false))?;
        self.run_query(&compiled).await.map(drop)
    }
}

/// Renders `$n` placeholders, inlining nulls. Returns the SQL and the values
/// that still need binding.
fn render(compiled: &CompiledSql) -> (String, Vec<&Parameter>) {
    let parts = compiled.parts();
    let mut sql = parts.first().cloned().unwrap_or_default();
    let mut bound = Vec::with_capacity(compiled.bindings().len());
    for (part, value) in parts.iter().skip(1).zip(compiled.bindings()) {
        if value.is_null() {
            sql.push_str("NULL");
        } else {
            bound.push(value);
            sql.push('$');
            sql.push_str(&bound.len().to_string());
        }
        sql.push_str(part);
    }
    (sql, bound)
}

async fn execute(
    client: &mut PgConnection,
    sql: &str,
    bindings: &[&Parameter],
    compiled: &CompiledSql,
) -> Result<QueryResult> {
    let query = bind_all(sqlx::query(sql), bindings)?;
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

fn bind_all<'q>(mut query: PgQuery<'q>, bindings: &[&Parameter]) -> Result<PgQuery<'q>> {
    for value in bindings {
        query = bind(query, value)?;
    }
    Ok(query)
}

fn bind<'q>(query: PgQuery<'q>, value: &Parameter) -> Result<PgQuery<'q>> {
    Ok(match value {
        Parameter::Null => query.bind(None::<String>),
        Parameter::Bool(value) => query.bind(*value),
        Parameter::Int(value) => query.bind(*value),
        Parameter::Float(value) => query.bind(*value),
        Parameter::Text(value) => query.bind(value.clone()),
        Parameter::Date(value) => query.bind(*value),
        Parameter::Array(values) => bind_array(query, values)?,
        Parameter::Expression(expr) => return Err(unbindable_expression(expr.sql())),
    })
}

/// Binds a list as a native array. The non-null elements must share one
/// scalar type; nulls become `NULL` entries. A list of only nulls binds as
/// `int8[]`.
fn bind_array<'q>(query: PgQuery<'q>, values: &[Parameter]) -> Result<PgQuery<'q>> {
    let all = |check: fn(&Parameter) -> bool| values.iter().all(|v| v.is_null() || check(v));

    if all(|v| matches!(v, Parameter::Int(_))) {
        let ints: Vec<Option<i64>> = values.iter().map(Parameter::as_i64).collect();
        return Ok(query.bind(ints));
    }
    if all(|v| matches!(v, Parameter::Int(_) | Parameter::Float(_))) {
        let floats: Vec<Option<f64>> = values.iter().map(Parameter::as_f64).collect();
        return Ok(query.bind(floats));
    }
    if all(|v| matches!(v, Parameter::Text(_))) {
        let texts: Vec<Option<String>> = values
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect();
        return Ok(query.bind(texts));
    }
    if all(|v| matches!(v, Parameter::Bool(_))) {
        let bools: Vec<Option<bool>> = values.iter().map(Parameter::as_bool).collect();
        return Ok(query.bind(bools));
    }
    if all(|v| matches!(v, Parameter::Date(_))) {
        let dates: Vec<Option<DateTime<Utc>>> =
            values.iter().map(|v| v.as_date().copied()).collect();
        return Ok(query.bind(dates));
    }
    Err(DbError::UnsupportedBinding(
        "array elements must share one scalar type".to_string(),
    ))
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        values.push(decode_value(row, index, column.name(), column.type_info().name())?);
    }
    Ok(Row::new(columns, values))
}

fn decode_value(row: &PgRow, index: usize, column: &str, type_name: &str) -> Result<Parameter> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Parameter::Null);
    }
    let value = match type_name {
        "BOOL" => Parameter::Bool(row.try_get_unchecked(index)?),
        "INT2" => Parameter::Int(i64::from(row.try_get_unchecked::<i16, _>(index)?)),
        "INT4" => Parameter::Int(i64::from(row.try_get_unchecked::<i32, _>(index)?)),
        "INT8" => Parameter::Int(row.try_get_unchecked(index)?),
        "FLOAT4" => Parameter::Float(f64::from(row.try_get_unchecked::<f32, _>(index)?)),
        "FLOAT8" => Parameter::Float(row.try_get_unchecked(index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" | "CITEXT" => {
            Parameter::Text(row.try_get_unchecked(index)?)
        }
        "TIMESTAMPTZ" => Parameter::Date(row.try_get_unchecked(index)?),
        "TIMESTAMP" => {
            let naive: NaiveDateTime = row.try_get_unchecked(index)?;
            Parameter::Date(Utc.from_utc_datetime(&naive))
        }
        "DATE" => {
            let date: NaiveDate = row.try_get_unchecked(index)?;
            Parameter::Date(Utc.from_utc_datetime(&date.and_time(NaiveTime::default())))
        }
        "TIME" => Parameter::Text(row.try_get_unchecked::<NaiveTime, _>(index)?.to_string()),
        "JSON" | "JSONB" => {
            Parameter::Text(row.try_get_unchecked::<serde_json::Value, _>(index)?.to_string())
        }
        "INT2[]" => int_array(row.try_get_unchecked::<Vec<i16>, _>(index)?),
        "INT4[]" => int_array(row.try_get_unchecked::<Vec<i32>, _>(index)?),
        "INT8[]" => int_array(row.try_get_unchecked::<Vec<i64>, _>(index)?),
        "FLOAT8[]" => Parameter::Array(
            row.try_get_unchecked::<Vec<f64>, _>(index)?
                .into_iter()
                .map(Parameter::Float)
                .collect(),
        ),
        "BOOL[]" => Parameter::Array(
            row.try_get_unchecked::<Vec<bool>, _>(index)?
                .into_iter()
                .map(Parameter::Bool)
                .collect(),
        ),
        "TEXT[]" | "VARCHAR[]" => Parameter::Array(
            row.try_get_unchecked::<Vec<String>, _>(index)?
                .into_iter()
                .map(Parameter::Text)
                .collect(),
        ),
        // Binary encodings that are not text; cast them in the query.
        "NUMERIC" | "UUID" | "BYTEA" | "INTERVAL" | "MONEY" => {
            return Err(unsupported(column, type_name));
        }
        _ => row
            .try_get_unchecked::<String, _>(index)
            .map(Parameter::Text)
            .map_err(|_| unsupported(column, type_name))?,
    };
    Ok(value)
}

fn int_array<T: Into<i64>>(values: Vec<T>) -> Parameter {
    Parameter::Array(values.into_iter().map(|v| Parameter::Int(v.into())).collect())
}

fn unsupported(column: &str, type_name: &str) -> DbError {
    DbError::UnsupportedColumnType {
        column: column.to_string(),
        type_name: type_name.to_string(),
    }
}

/// A declared `no scroll` cursor, fetched forward in batches.
pub(crate) struct ServerCursor {
    session: Arc<Mutex<Session<Postgres>>>,
    name: String,
    batch_size: usize,
    exhausted: bool,
    closed: bool,
}

impl ServerCursor {
    pub(crate) const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetches the next batch. A short batch marks the cursor exhausted.
    pub(crate) async fn fetch(&mut self) -> Result<Vec<Row>> {
        let sql = format!("fetch forward {} from {}", self.batch_size, self.name);
        let rows = {
            let mut session = self.session.lock().await;
            let client = session.client().await?;
            sqlx::query(&sql).fetch_all(client).await?
        };
        if rows.len() < self.batch_size {
            self.exhausted = true;
        }
        rows.iter().map(decode_row).collect()
    }

    pub(crate) async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        close_cursor(&self.session, &self.name).await
    }
}

async fn close_cursor(session: &Mutex<Session<Postgres>>, name: &str) -> Result<()> {
    let mut session = session.lock().await;
    let sql = format!("close {name}");
    let client = session.client().await?;
    client.execute(sql.as_str()).await?;
    debug!(cursor = %name, "Closed server cursor");
    session.release_cursor().await
}

impl Drop for ServerCursor {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let session = Arc::clone(&self.session);
        let name = std::mem::take(&mut self.name);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = close_cursor(&session, &name).await {
                        warn!(cursor = %name, error = %err, "Failed to close dropped cursor");
                    }
                });
            }
            Err(_) => {
                warn!(cursor = %name, "Cursor dropped outside a runtime, left open until disconnect");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Query;

    fn compile(build: impl FnOnce(&mut Query)) -> CompiledSql {
        let mut query = Query::new(Dialect::Postgres.query_grammar());
        query.table("users");
        build(&mut query);
        query.to_sql().unwrap()
    }

    #[test]
    fn test_render_numbers_placeholders() {
        let compiled = compile(|q| {
            q.where_op("name", "=", "bob").unwrap().where_op("age", ">", 3).unwrap();
        });
        let (sql, bound) = render(&compiled);
        assert_eq!(sql, "select * from users where name = $1 and age > $2");
        assert_eq!(bound.len(), 2);
    }

    #[test]
    fn test_render_inlines_nulls() {
        let compiled = compile(|q| {
            q.where_op("a", "=", 1)
                .unwrap()
                .where_op("b", "=", Parameter::Null)
                .unwrap()
                .where_op("c", "=", 2)
                .unwrap();
        });
        let (sql, bound) = render(&compiled);
        assert_eq!(sql, "select * from users where a = $1 and b = NULL and c = $2");
        assert_eq!(bound, vec![&Parameter::Int(1), &Parameter::Int(2)]);
    }

    #[tokio::test]
    async fn test_query_event_carries_sent_bindings() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/quarry")
            .unwrap();
        let conn = PostgresConnection::new(pool);
        let mut events = conn.subscribe();

        let compiled = compile(|q| {
            q.where_op("a", "=", Parameter::Null)
                .unwrap()
                .where_op("b", "=", 7)
                .unwrap();
        });
        let (sql, bound) = render(&compiled);
        conn.record(&sql, &bound, Instant::now(), Ok(())).unwrap();

        match events.try_recv().unwrap() {
            ConnectionEvent::Query { sql, bindings, .. } => {
                assert_eq!(sql, "select * from users where a = NULL and b = $1");
                assert_eq!(bindings, vec![Parameter::Int(7)]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_mixed_array_is_rejected() {
        let result = bind_array(
            sqlx::query("select $1"),
            &[Parameter::Int(1), Parameter::Text("a".into())],
        );
        assert!(matches!(result, Err(DbError::UnsupportedBinding(_))));
    }

    #[test]
    fn test_array_with_nulls_binds() {
        let with_nulls = [Parameter::Int(1), Parameter::Null, Parameter::Int(3)];
        assert!(bind_array(sqlx::query("select $1"), &with_nulls).is_ok());

        let texts = [Parameter::Null, Parameter::Text("a".into())];
        assert!(bind_array(sqlx::query("select $1"), &texts).is_ok());

        assert!(bind_array(sqlx::query("select $1"), &[Parameter::Null, Parameter::Null]).is_ok());

        let mixed = [Parameter::Null, Parameter::Text("a".into()), Parameter::Bool(true)];
        assert!(matches!(
            bind_array(sqlx::query("select $1"), &mixed),
            Err(DbError::UnsupportedBinding(_))
        ));
    }

    #[test]
    fn test_expression_binding_is_rejected() {
        let value = Parameter::Expression(quarry_core::Expression::new("now()"));
        assert!(bind(sqlx::query("select $1"), &value).is_err());
    }
}
