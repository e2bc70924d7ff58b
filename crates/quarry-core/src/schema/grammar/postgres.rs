//! PostgreSQL schema grammar.

use super::{count_where, SchemaGrammar};
use crate::compiled::{CompiledSql, StatementKind};
use crate::grammar::Dialect;
use crate::schema::blueprint::ColumnType;

/// PostgreSQL schema grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresSchemaGrammar;

impl PostgresSchemaGrammar {
    /// Creates a new PostgreSQL schema grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SchemaGrammar for PostgresSchemaGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn column_type(&self, column_type: ColumnType) -> String {
        match column_type {
            ColumnType::Increments => "SERIAL".to_string(),
            ColumnType::BigIncrements => "BIGSERIAL".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Double => "DOUBLE PRECISION".to_string(),
            ColumnType::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
            ColumnType::String(length) => format!("VARCHAR({length})"),
            ColumnType::Char(length) => format!("CHAR({length})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::TimestampTz => "TIMESTAMPTZ".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Jsonb => "JSONB".to_string(),
            ColumnType::Uuid => "UUID".to_string(),
            ColumnType::Binary => "BYTEA".to_string(),
        }
    }

    fn compile_table_exists(&self, table: &str) -> CompiledSql {
        count_where(
            "information_schema.tables where table_schema = current_schema()",
            &[("table_name", table)],
        )
    }

    fn compile_tables(&self) -> CompiledSql {
        CompiledSql::raw(
            "select table_name::text as name from information_schema.tables \
             where table_schema = current_schema() and table_type = 'BASE TABLE' \
             order by table_name",
            StatementKind::Select,
        )
    }

    fn compile_column_exists(&self, table: &str, column: &str) -> CompiledSql {
        count_where(
            "information_schema.columns where table_schema = current_schema()",
            &[("table_name", table), ("column_name", column)],
        )
    }
}
