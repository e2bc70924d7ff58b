//! Query grammars.
//!
//! A grammar turns [`QueryParts`] plus an operation into a [`CompiledSql`].
//! The trait's provided methods delegate to the shared helpers in
//! [`compile`]; each dialect overrides only what differs.

pub mod compile;
mod mysql;
mod postgres;
mod sqlite;

use std::fmt;
use std::sync::Arc;

pub use mysql::MySqlGrammar;
pub use postgres::PostgresGrammar;
pub use sqlite::SqliteGrammar;

use crate::compiled::{CompiledSql, PlaceholderStyle, StatementKind};
use crate::error::{BuildError, Result};
use crate::lexer::StringEscapes;
use crate::query::parts::{JoinType, QueryParts};
use crate::schema::grammar::{
    MySqlSchemaGrammar, PostgresSchemaGrammar, SchemaGrammar, SqliteSchemaGrammar,
};
use crate::value::Record;

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL / MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// Returns the dialect name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Returns the placeholder style the driver expects.
    #[must_use]
    pub const fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            Self::Postgres => PlaceholderStyle::Numbered,
            Self::MySql | Self::Sqlite => PlaceholderStyle::QuestionMark,
        }
    }

    /// Returns how string literals treat backslashes.
    #[must_use]
    pub const fn string_escapes(self) -> StringEscapes {
        match self {
            Self::MySql => StringEscapes::Backslash,
            Self::Postgres | Self::Sqlite => StringEscapes::Standard,
        }
    }

    /// Returns the query grammar for this dialect.
    #[must_use]
    pub fn query_grammar(self) -> Arc<dyn QueryGrammar> {
        match self {
            Self::Postgres => Arc::new(PostgresGrammar::new()),
            Self::MySql => Arc::new(MySqlGrammar::new()),
            Self::Sqlite => Arc::new(SqliteGrammar::new()),
        }
    }

    /// Returns the schema grammar for this dialect.
    #[must_use]
    pub fn schema_grammar(self) -> Arc<dyn SchemaGrammar> {
        match self {
            Self::Postgres => Arc::new(PostgresSchemaGrammar::new()),
            Self::MySql => Arc::new(MySqlSchemaGrammar::new()),
            Self::Sqlite => Arc::new(SqliteSchemaGrammar::new()),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operators every dialect accepts.
pub const BASE_OPERATORS: &[&str] = &[
    "=", "!=", "<>", ">", ">=", "<", "<=", "like", "not like", "ilike",
];

/// Compiles query parts into SQL for one dialect.
pub trait QueryGrammar: fmt::Debug + Send + Sync {
    /// Returns the dialect.
    fn dialect(&self) -> Dialect;

    /// Returns the full operator allow-list.
    fn operators(&self) -> &'static [&'static str] {
        BASE_OPERATORS
    }

    /// Returns whether `insert ... returning` is available.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Returns whether the join type can be expressed.
    fn supports_join(&self, join_type: JoinType) -> bool {
        let _ = join_type;
        true
    }

    /// Maps a validated operator to the text emitted in SQL.
    fn render_operator<'a>(&self, operator: &'a str) -> &'a str {
        operator
    }

    /// Limit emitted when only an offset is set, for dialects that need one.
    fn limit_for_offset_only(&self) -> Option<&'static str> {
        None
    }

    /// Normalizes an operator and checks it against the allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnsupportedOperator`] if it is not allowed.
    fn validate_operator(&self, operator: &str) -> Result<String> {
        let normalized = operator
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        if self.operators().contains(&normalized.as_str()) {
            Ok(normalized)
        } else {
            Err(BuildError::UnsupportedOperator {
                operator: operator.to_string(),
                dialect: self.dialect(),
            })
        }
    }

    /// Compiles a select.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingTable`] if no table is set.
    fn compile_select(&self, parts: &QueryParts) -> Result<CompiledSql> {
        let mut writer = compile::writer_for(self);
        compile::write_select(self, parts, &mut writer)?;
        Ok(writer.finish(StatementKind::Select))
    }

    /// Compiles `select count(*) as count`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingTable`] if no table is set.
    fn compile_count(&self, parts: &QueryParts) -> Result<CompiledSql> {
        compile::count(self, parts)
    }

    /// Statement used to insert a row with no explicit columns.
    fn compile_empty_insert(&self, table: &str) -> String {
        format!("insert into {table} default values")
    }

    /// Compiles a single or batch insert.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::EmptyInsert`] for an empty batch and
    /// [`BuildError::MismatchedRow`] when rows disagree on columns.
    fn compile_insert(&self, table: &str, rows: &[Record]) -> Result<CompiledSql> {
        let mut writer = compile::writer_for(self);
        compile::write_insert(self, "insert into", table, rows, &mut writer)?;
        Ok(writer.finish(StatementKind::Insert))
    }

    /// Compiles an insert that reports the generated key(s).
    ///
    /// # Errors
    ///
    /// See [`QueryGrammar::compile_insert`].
    fn compile_insert_get_id(
        &self,
        table: &str,
        row: &Record,
        primary_keys: &[String],
    ) -> Result<CompiledSql> {
        compile::insert_returning(self, table, row, primary_keys)
    }

    /// Compiles an update of the rows matched by the where clauses.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::EmptyUpdate`] if `values` is empty.
    fn compile_update(&self, parts: &QueryParts, values: &Record) -> Result<CompiledSql> {
        compile::update(self, parts, values)
    }

    /// Compiles a delete of the rows matched by the where clauses.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingTable`] if no table is set.
    fn compile_delete(&self, parts: &QueryParts) -> Result<CompiledSql> {
        compile::delete(self, parts)
    }

    /// Compiles an insert-or-update keyed by `conflict` columns.
    ///
    /// # Errors
    ///
    /// See [`QueryGrammar::compile_insert`]; an empty `conflict` list is
    /// [`BuildError::MissingInput`].
    fn compile_upsert(
        &self,
        table: &str,
        rows: &[Record],
        conflict: &[String],
        update: &[String],
    ) -> Result<CompiledSql> {
        compile::upsert_on_conflict(self, table, rows, conflict, update)
    }
}
