//! SQLite schema grammar.

use super::{count_where, SchemaGrammar};
use crate::compiled::{CompiledSql, SqlWriter, StatementKind};
use crate::error::Result;
use crate::grammar::Dialect;
use crate::schema::blueprint::ColumnType;

/// SQLite schema grammar.
///
/// Databases are files, so `create database` is left to the connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteSchemaGrammar;

impl SqliteSchemaGrammar {
    /// Creates a new SQLite schema grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SchemaGrammar for SqliteSchemaGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn column_type(&self, column_type: ColumnType) -> String {
        match column_type {
            ColumnType::Increments
            | ColumnType::BigIncrements
            | ColumnType::Integer
            | ColumnType::BigInteger
            | ColumnType::SmallInteger => "INTEGER".to_string(),
            ColumnType::Float | ColumnType::Double => "REAL".to_string(),
            ColumnType::Decimal { .. } => "NUMERIC".to_string(),
            ColumnType::String(length) => format!("VARCHAR({length})"),
            ColumnType::Char(length) => format!("CHAR({length})"),
            ColumnType::Text | ColumnType::Uuid => "TEXT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::TimestampTz => "TIMESTAMP WITH TIME ZONE".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Jsonb => "JSONB".to_string(),
            ColumnType::Binary => "BLOB".to_string(),
        }
    }

    fn render_bool(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn supports_alter_constraints(&self) -> bool {
        false
    }

    fn compile_table_exists(&self, table: &str) -> CompiledSql {
        count_where("sqlite_master where type = 'table'", &[("name", table)])
    }

    fn compile_tables(&self) -> CompiledSql {
        CompiledSql::raw(
            "select name from sqlite_master where type = 'table' \
             and name not like 'sqlite_%' order by name",
            StatementKind::Select,
        )
    }

    fn compile_column_exists(&self, table: &str, column: &str) -> CompiledSql {
        let mut writer = SqlWriter::new();
        writer.push("select count(*) as count from pragma_table_info(");
        writer.bind_text(table);
        writer.push(") where name = ");
        writer.bind_text(column);
        writer.finish(StatementKind::Select)
    }

    fn compile_create_database(&self, name: &str) -> Result<CompiledSql> {
        Err(self.unsupported(&format!("create database {name}")))
    }

    fn compile_drop_database(&self, name: &str) -> Result<CompiledSql> {
        Err(self.unsupported(&format!("drop database {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::schema::blueprint::Blueprint;

    #[test]
    fn test_create_with_index() {
        let mut table = Blueprint::create("migrations");
        table.id();
        table.string("filename", 255);
        table.integer("batch");
        table.index(["batch"]);

        let statements = SqliteSchemaGrammar::new().compile_create(&table).unwrap();
        assert_eq!(
            statements[0].sql(),
            "create table \"migrations\" (\"id\" INTEGER not null, \"filename\" VARCHAR(255) not null, \
             \"batch\" INTEGER not null, primary key (\"id\"))"
        );
        assert_eq!(
            statements[1].sql(),
            "create index \"migrations_batch_index\" on \"migrations\" (\"batch\")"
        );
    }

    #[test]
    fn test_timestamptz_is_textual() {
        assert_eq!(
            SqliteSchemaGrammar::new().column_type(ColumnType::TimestampTz),
            "TIMESTAMP WITH TIME ZONE"
        );
    }

    #[test]
    fn test_alter_rejects_keys() {
        let mut table = Blueprint::alter("posts");
        table.integer("user_id").nullable();
        table.foreign("user_id").on("users");
        let err = SqliteSchemaGrammar::new().compile_alter(&table).unwrap_err();
        assert!(matches!(err, BuildError::Unsupported { .. }));
    }

    #[test]
    fn test_column_exists_binds_table_then_column() {
        let compiled = SqliteSchemaGrammar::new().compile_column_exists("users", "email");
        assert_eq!(
            compiled.sql(),
            "select count(*) as count from pragma_table_info(?) where name = ?"
        );
        assert_eq!(
            compiled.bindings(),
            &[
                crate::value::Parameter::Text("users".into()),
                crate::value::Parameter::Text("email".into())
            ]
        );
    }

    #[test]
    fn test_database_ddl_is_unsupported() {
        let grammar = SqliteSchemaGrammar::new();
        assert!(grammar.compile_create_database("app").is_err());
        assert!(grammar.compile_drop_database("app").is_err());
    }
}
