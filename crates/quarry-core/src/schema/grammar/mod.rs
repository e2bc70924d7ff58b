//! Schema grammars.
//!
//! A schema grammar compiles [`Blueprint`]s into DDL and produces the
//! introspection queries used by `table_exists`, `has_column` and `tables`.
//! Every statement comes back as a [`CompiledSql`] so DDL and queries share
//! one execution path.

mod mysql;
mod postgres;
mod sqlite;

use std::fmt;

pub use mysql::MySqlSchemaGrammar;
pub use postgres::PostgresSchemaGrammar;
pub use sqlite::SqliteSchemaGrammar;

use super::blueprint::{
    Blueprint, BlueprintMode, ColumnDefinition, ColumnType, ForeignKeyConstraint, IndexDefinition,
};
use crate::compiled::{CompiledSql, SqlWriter, StatementKind};
use crate::error::{BuildError, Result};
use crate::grammar::Dialect;
use crate::identifier::validate_identifier;
use crate::value::Parameter;

/// Compiles blueprints and schema operations for one dialect.
pub trait SchemaGrammar: fmt::Debug + Send + Sync {
    /// Returns the dialect.
    fn dialect(&self) -> Dialect;

    /// Returns the native type for a logical column type.
    fn column_type(&self, column_type: ColumnType) -> String;

    /// Quotes an identifier, doubling embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quotes and joins a list of identifiers.
    fn quote_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|name| self.quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Returns the boolean literal used in defaults.
    fn render_bool(&self, value: bool) -> &'static str {
        if value {
            "true"
        } else {
            "false"
        }
    }

    /// Renders a default value as a SQL literal.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Unsupported`] for list defaults and expressions
    /// that carry bindings.
    fn render_default(&self, value: &Parameter) -> Result<String> {
        Ok(match value {
            Parameter::Null => "null".to_string(),
            Parameter::Bool(value) => self.render_bool(*value).to_string(),
            Parameter::Int(value) => value.to_string(),
            Parameter::Float(value) => value.to_string(),
            Parameter::Text(value) => quote_literal(value),
            Parameter::Date(value) => quote_literal(&value.format("%Y-%m-%d %H:%M:%S").to_string()),
            Parameter::Expression(expr) if expr.bindings().is_empty() => expr.sql().to_string(),
            Parameter::Expression(_) => {
                return Err(self.unsupported("bound expressions as column defaults"));
            }
            Parameter::Array(_) => {
                return Err(self.unsupported("list values as column defaults"));
            }
        })
    }

    /// Extra text after the nullability marker.
    fn column_modifiers(&self, column: &ColumnDefinition) -> String {
        let _ = column;
        String::new()
    }

    /// Renders `"name" TYPE not null [unique] [default x]`.
    ///
    /// # Errors
    ///
    /// See [`SchemaGrammar::render_default`].
    fn column_definition(&self, column: &ColumnDefinition) -> Result<String> {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(column.name()),
            self.column_type(column.column_type())
        );
        sql.push_str(if column.is_nullable() { " null" } else { " not null" });
        sql.push_str(&self.column_modifiers(column));
        if column.is_unique() {
            sql.push_str(" unique");
        }
        if let Some(default) = column.default_value() {
            sql.push_str(" default ");
            sql.push_str(&self.render_default(default)?);
        }
        Ok(sql)
    }

    /// Renders a named foreign key constraint.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingInput`] if no referenced table was given.
    fn foreign_key_definition(&self, table: &str, foreign: &ForeignKeyConstraint) -> Result<String> {
        let referenced = foreign.referenced_table().ok_or_else(|| {
            BuildError::MissingInput(format!(
                "foreign key ({}) on {table} needs a referenced table",
                foreign.columns().join(", ")
            ))
        })?;

        let name = format!("{table}_{}_foreign", foreign.columns().join("_"));
        let mut sql = format!(
            "constraint {} foreign key ({}) references {} ({})",
            self.quote_identifier(&name),
            self.quote_list(foreign.columns()),
            self.quote_identifier(referenced),
            self.quote_list(&foreign.referenced_columns()),
        );
        if let Some(action) = foreign.delete_action() {
            sql.push_str(" on delete ");
            sql.push_str(action.as_sql());
        }
        if let Some(action) = foreign.update_action() {
            sql.push_str(" on update ");
            sql.push_str(action.as_sql());
        }
        Ok(sql)
    }

    /// Compiles `create [unique] index`.
    fn compile_index(&self, table: &str, index: &IndexDefinition) -> CompiledSql {
        let unique = if index.is_unique() { "unique " } else { "" };
        CompiledSql::raw(
            format!(
                "create {unique}index {} on {} ({})",
                self.quote_identifier(index.index_name()),
                self.quote_identifier(table),
                self.quote_list(index.columns()),
            ),
            StatementKind::Schema,
        )
    }

    /// Compiles `drop index`.
    fn compile_drop_index(&self, table: &str, name: &str) -> CompiledSql {
        let _ = table;
        CompiledSql::raw(
            format!("drop index {}", self.quote_identifier(name)),
            StatementKind::Schema,
        )
    }

    /// Returns whether keys can be added to an existing table.
    fn supports_alter_constraints(&self) -> bool {
        true
    }

    /// Compiles a blueprint according to its mode.
    ///
    /// # Errors
    ///
    /// See [`SchemaGrammar::compile_create`] and
    /// [`SchemaGrammar::compile_alter`].
    fn compile_blueprint(&self, blueprint: &Blueprint) -> Result<Vec<CompiledSql>> {
        match blueprint.mode() {
            BlueprintMode::Create => self.compile_create(blueprint),
            BlueprintMode::Alter => self.compile_alter(blueprint),
        }
    }

    /// Compiles `create table` followed by its indexes.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingInput`] for a table without columns.
    fn compile_create(&self, blueprint: &Blueprint) -> Result<Vec<CompiledSql>> {
        if blueprint.columns().is_empty() {
            return Err(BuildError::MissingInput(format!(
                "table {} needs at least one column",
                blueprint.table()
            )));
        }

        let mut definitions = blueprint
            .columns()
            .iter()
            .map(|column| self.column_definition(column))
            .collect::<Result<Vec<_>>>()?;

        if !blueprint.primary_keys().is_empty() {
            definitions.push(format!("primary key ({})", self.quote_list(blueprint.primary_keys())));
        }
        for foreign in blueprint.foreign_keys() {
            definitions.push(self.foreign_key_definition(blueprint.table(), foreign)?);
        }

        let mut statements = vec![CompiledSql::raw(
            format!(
                "create table {} ({})",
                self.quote_identifier(blueprint.table()),
                definitions.join(", ")
            ),
            StatementKind::Schema,
        )];
        statements.extend(
            blueprint
                .indexes()
                .iter()
                .map(|index| self.compile_index(blueprint.table(), index)),
        );
        Ok(statements)
    }

    /// Compiles one statement per change in an alter blueprint.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Unsupported`] for keys on dialects that cannot
    /// add them to an existing table.
    fn compile_alter(&self, blueprint: &Blueprint) -> Result<Vec<CompiledSql>> {
        let table = self.quote_identifier(blueprint.table());
        let mut statements = Vec::new();
        let alter = |clause: String| {
            CompiledSql::raw(format!("alter table {table} {clause}"), StatementKind::Schema)
        };

        let needs_constraints =
            !blueprint.primary_keys().is_empty() || !blueprint.foreign_keys().is_empty();
        if needs_constraints && !self.supports_alter_constraints() {
            return Err(self.unsupported("adding keys to an existing table"));
        }

        for column in blueprint.columns() {
            statements.push(alter(format!("add column {}", self.column_definition(column)?)));
        }
        for column in blueprint.dropped_columns() {
            statements.push(alter(format!("drop column {}", self.quote_identifier(column))));
        }
        if !blueprint.primary_keys().is_empty() {
            statements.push(alter(format!(
                "add primary key ({})",
                self.quote_list(blueprint.primary_keys())
            )));
        }
        for foreign in blueprint.foreign_keys() {
            statements.push(alter(format!(
                "add {}",
                self.foreign_key_definition(blueprint.table(), foreign)?
            )));
        }
        for index in blueprint.indexes() {
            statements.push(self.compile_index(blueprint.table(), index));
        }
        for name in blueprint.dropped_indexes() {
            statements.push(self.compile_drop_index(blueprint.table(), name));
        }
        Ok(statements)
    }

    /// Compiles `drop table [if exists]`.
    fn compile_drop(&self, table: &str, if_exists: bool) -> CompiledSql {
        let if_exists = if if_exists { "if exists " } else { "" };
        CompiledSql::raw(
            format!("drop table {if_exists}{}", self.quote_identifier(table)),
            StatementKind::Schema,
        )
    }

    /// Compiles a table rename.
    fn compile_rename(&self, from: &str, to: &str) -> CompiledSql {
        CompiledSql::raw(
            format!(
                "alter table {} rename to {}",
                self.quote_identifier(from),
                self.quote_identifier(to)
            ),
            StatementKind::Schema,
        )
    }

    /// Compiles a query returning one row with a `count` column, non-zero
    /// when the table exists.
    fn compile_table_exists(&self, table: &str) -> CompiledSql;

    /// Compiles a query listing table names in a `name` column.
    fn compile_tables(&self) -> CompiledSql;

    /// Compiles a query returning a non-zero `count` when the column exists.
    fn compile_column_exists(&self, table: &str, column: &str) -> CompiledSql;

    /// Compiles `create database`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Identifier`] for an invalid name.
    fn compile_create_database(&self, name: &str) -> Result<CompiledSql> {
        let name = validate_identifier(name)?;
        Ok(CompiledSql::raw(
            format!("create database {}", self.quote_identifier(name)),
            StatementKind::Schema,
        ))
    }

    /// Compiles `drop database`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Identifier`] for an invalid name.
    fn compile_drop_database(&self, name: &str) -> Result<CompiledSql> {
        let name = validate_identifier(name)?;
        Ok(CompiledSql::raw(
            format!("drop database {}", self.quote_identifier(name)),
            StatementKind::Schema,
        ))
    }

    /// Builds an [`BuildError::Unsupported`] for this dialect.
    fn unsupported(&self, feature: &str) -> BuildError {
        BuildError::Unsupported {
            feature: feature.to_string(),
            dialect: self.dialect(),
        }
    }
}

/// Quotes a string literal, doubling single quotes.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Compiles `select count(*) as count from <source> where a = ? [and b = ?]`.
pub(crate) fn count_where(source: &str, filters: &[(&str, &str)]) -> CompiledSql {
    let mut writer = SqlWriter::new();
    writer.push("select count(*) as count from ").push(source);
    for (index, (column, value)) in filters.iter().enumerate() {
        writer
            .push(if index == 0 { " where " } else { " and " })
            .push(column)
            .push(" = ");
        writer.bind_text(value);
    }
    writer.finish(StatementKind::Select)
}
