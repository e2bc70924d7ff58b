//! MySQL schema grammar.

use super::{count_where, SchemaGrammar};
use crate::compiled::{CompiledSql, StatementKind};
use crate::grammar::Dialect;
use crate::schema::blueprint::{ColumnDefinition, ColumnType};

/// MySQL schema grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlSchemaGrammar;

impl MySqlSchemaGrammar {
    /// Creates a new MySQL schema grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SchemaGrammar for MySqlSchemaGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn column_type(&self, column_type: ColumnType) -> String {
        match column_type {
            ColumnType::Increments | ColumnType::Integer => "INT".to_string(),
            ColumnType::BigIncrements | ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
            ColumnType::String(length) => format!("VARCHAR({length})"),
            ColumnType::Char(length) => format!("CHAR({length})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp | ColumnType::TimestampTz => "TIMESTAMP".to_string(),
            ColumnType::Json | ColumnType::Jsonb => "JSON".to_string(),
            ColumnType::Uuid => "CHAR(36)".to_string(),
            ColumnType::Binary => "BLOB".to_string(),
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn render_bool(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn column_modifiers(&self, column: &ColumnDefinition) -> String {
        if column.column_type().is_auto_increment() {
            " auto_increment".to_string()
        } else {
            String::new()
        }
    }

    fn compile_drop_index(&self, table: &str, name: &str) -> CompiledSql {
        CompiledSql::raw(
            format!(
                "drop index {} on {}",
                self.quote_identifier(name),
                self.quote_identifier(table)
            ),
            StatementKind::Schema,
        )
    }

    fn compile_rename(&self, from: &str, to: &str) -> CompiledSql {
        CompiledSql::raw(
            format!(
                "rename table {} to {}",
                self.quote_identifier(from),
                self.quote_identifier(to)
            ),
            StatementKind::Schema,
        )
    }

    fn compile_table_exists(&self, table: &str) -> CompiledSql {
        count_where(
            "information_schema.tables where table_schema = database()",
            &[("table_name", table)],
        )
    }

    fn compile_tables(&self) -> CompiledSql {
        CompiledSql::raw(
            "select table_name as name from information_schema.tables \
             where table_schema = database() and table_type = 'BASE TABLE' \
             order by table_name",
            StatementKind::Select,
        )
    }

    fn compile_column_exists(&self, table: &str, column: &str) -> CompiledSql {
        count_where(
            "information_schema.columns where table_schema = database()",
            &[("table_name", table), ("column_name", column)],
        )
    }
}
