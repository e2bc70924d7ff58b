//! MySQL driver.
//!
//! MySQL has no `returning`, so `insert_get_id` reads the driver's last
//! insert id. Arrays are bound as JSON text and cursors buffer the result.

use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use quarry_core::{CompiledSql, Dialect, Parameter, StatementKind};
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlRow};
use sqlx::{Column as _, MySql, Row as _, TypeInfo as _, ValueRef as _};
use tokio::sync::broadcast;

use crate::config::PoolConfig;
use crate::connection::{database_statement, Connection};
use crate::convert::{array_to_json, bytes_to_text, unbindable_expression};
use crate::cursor::Cursor;
use crate::error::{DbError, Result};
use crate::event::{ConnectionEvent, EventBus};
use crate::row::{QueryResult, Row};
use crate::session::SessionHandle;

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// A MySQL or MariaDB connection.
#[derive(Clone)]
pub struct MySqlConnection {
    handle: SessionHandle<MySql>,
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection").finish_non_exhaustive()
    }
}

impl MySqlConnection {
    /// Wraps an existing pool. No client is acquired until first use.
    #[must_use]
    pub fn new(pool: MySqlPool) -> Self {
        Self::with_acquire_timeout(pool, PoolConfig::default().acquire_timeout())
    }

    /// Wraps an existing pool, reporting `timeout` when acquisition fails.
    #[must_use]
    pub fn with_acquire_timeout(pool: MySqlPool, timeout: Duration) -> Self {
        Self {
            handle: SessionHandle::new(pool, timeout, EventBus::new(Dialect::MySql)),
        }
    }

    /// Builds a pool for `url` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the pool cannot be created.
    pub async fn open(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = config.options::<MySql>().connect(url).await?;
        Ok(Self::with_acquire_timeout(pool, config.acquire_timeout()))
    }
}

impl Connection for MySqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
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

async fn execute(
    client: &mut sqlx::mysql::MySqlConnection,
    compiled: &CompiledSql,
) -> Result<QueryResult> {
    let mut query = sqlx::query(compiled.sql());
    for value in compiled.bindings() {
        query = bind(query, value)?;
    }
    if compiled.returns_rows() {
        let rows = query.fetch_all(client).await?;
        let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;
        return Ok(QueryResult::from_rows(rows));
    }
    let done = query.execute(client).await?;
    Ok(write_result(
        compiled.kind(),
        done.rows_affected(),
        done.last_insert_id(),
    ))
}

/// The result of a statement that returned no rows. Only `insert_get_id`
/// reports the last insert id.
fn write_result(kind: StatementKind, rows_affected: u64, last_insert_id: u64) -> QueryResult {
    let mut result = QueryResult {
        rows_affected,
        ..QueryResult::default()
    };
    if kind == StatementKind::InsertGetId {
        result.inserted_ids = vec![unsigned(last_insert_id)];
    }
    result
}

/// Unsigned values beyond `i64::MAX` come back as text.
fn unsigned(value: u64) -> Parameter {
    i64::try_from(value).map_or_else(|_| Parameter::Text(value.to_string()), Parameter::Int)
}

fn midnight(date: NaiveDate) -> Parameter {
    Parameter::Date(Utc.from_utc_datetime(&date.and_time(NaiveTime::default())))
}

fn bind<'q>(query: MySqlQuery<'q>, value: &Parameter) -> Result<MySqlQuery<'q>> {
    Ok(match value {
        Parameter::Null => query.bind(None::<String>),
        Parameter::Bool(value) => query.bind(*value),
        Parameter::Int(value) => query.bind(*value),
        Parameter::Float(value) => query.bind(*value),
        Parameter::Text(value) => query.bind(value.clone()),
        Parameter::Date(value) => query.bind(*value),
        Parameter::Array(values) => query.bind(array_to_json(values)?),
        Parameter::Expression(expr) => return Err(unbindable_expression(expr.sql())),
    })
}

fn decode_row(row: &MySqlRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        values.push(decode_value(row, index, column.name(), column.type_info().name())?);
    }
    Ok(Row::new(columns, values))
}

fn decode_value(row: &MySqlRow, index: usize, column: &str, type_name: &str) -> Result<Parameter> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Parameter::Null);
    }
    let value = match type_name {
        "BOOLEAN" => Parameter::Bool(row.try_get_unchecked(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Parameter::Int(row.try_get_unchecked(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "BIT" => {
            unsigned(row.try_get_unchecked(index)?)
        }
        "FLOAT" => Parameter::Float(f64::from(row.try_get_unchecked::<f32, _>(index)?)),
        "DOUBLE" => Parameter::Float(row.try_get_unchecked(index)?),
        "DATETIME" => {
            let naive: NaiveDateTime = row.try_get_unchecked(index)?;
            Parameter::Date(Utc.from_utc_datetime(&naive))
        }
        "TIMESTAMP" => Parameter::Date(row.try_get_unchecked::<DateTime<Utc>, _>(index)?),
        "DATE" => midnight(row.try_get_unchecked(index)?),
        "TIME" => Parameter::Text(row.try_get_unchecked::<NaiveTime, _>(index)?.to_string()),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            bytes_to_text(column, type_name, row.try_get_unchecked(index)?)?
        }
        // DECIMAL, JSON, ENUM and the character types all arrive as text.
        _ => row
            .try_get_unchecked::<String, _>(index)
            .map(Parameter::Text)
            .map_err(|_| DbError::UnsupportedColumnType {
                column: column.to_string(),
                type_name: type_name.to_string(),
            })?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{Query, Record};

    fn compile(
        build: impl FnOnce(&Query) -> std::result::Result<CompiledSql, quarry_core::BuildError>,
    ) -> CompiledSql {
        let mut query = Query::new(Dialect::MySql.query_grammar());
        query.table("users");
        build(&query).unwrap()
    }

    #[test]
    fn test_unsigned_overflows_to_text() {
        assert_eq!(unsigned(42), Parameter::Int(42));
        assert_eq!(unsigned((1 << 63) - 1), Parameter::Int(i64::MAX));
        assert_eq!(unsigned(1 << 63), Parameter::Text("9223372036854775808".into()));
        assert_eq!(unsigned(u64::MAX), Parameter::Text("18446744073709551615".into()));
    }

    #[test]
    fn test_insert_get_id_reports_last_insert_id() {
        let compiled = compile(|q| {
            q.compile_insert_get_id(
                &Record::new().set("name", "a"),
                &quarry_core::InsertGetIdOptions::default(),
            )
        });
        assert!(!compiled.returns_rows());

        let result = write_result(compiled.kind(), 1, 17);
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.inserted_ids, vec![Parameter::Int(17)]);
    }

    #[test]
    fn test_plain_write_has_no_inserted_ids() {
        let compiled = compile(|q| q.compile_insert(&[Record::new().set("name", "a")]));
        let result = write_result(compiled.kind(), 1, 17);
        assert!(result.inserted_ids.is_empty());
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_date_decodes_as_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let Parameter::Date(value) = midnight(date) else {
            panic!("expected a date");
        };
        assert_eq!(value.to_rfc3339(), "2024-02-29T00:00:00+00:00");
    }

    #[test]
    fn test_array_binds_as_json() {
        let values = Parameter::Array(vec![Parameter::Int(1), Parameter::Null]);
        assert!(bind(sqlx::query("select ?"), &values).is_ok());

        let nan = Parameter::Array(vec![Parameter::Float(f64::NAN)]);
        assert!(matches!(
            bind(sqlx::query("select ?"), &nan),
            Err(DbError::UnsupportedBinding(_))
        ));
    }

    #[test]
    fn test_expression_binding_is_rejected() {
        let value = Parameter::Expression(quarry_core::Expression::new("now()"));
        assert!(matches!(
            bind(sqlx::query("select ?"), &value),
            Err(DbError::UnsupportedBinding(_))
        ));
    }

    #[tokio::test]
    async fn test_buffered_cursor_yields_rows_in_order() {
        let rows = (1..=3)
            .map(|id| Row::new(vec!["id".into()], vec![Parameter::Int(id)]))
            .collect();
        let mut cursor = Cursor::buffered(rows);
        let mut seen = Vec::new();
        while let Some(row) = cursor.next().await.unwrap() {
            seen.push(row.get("id").cloned());
        }
        assert_eq!(
            seen,
            vec![Some(Parameter::Int(1)), Some(Parameter::Int(2)), Some(Parameter::Int(3))]
        );
    }
}
