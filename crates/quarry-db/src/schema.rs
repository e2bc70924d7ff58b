//! Schema operations bound to a connection.

use quarry_core::{split_statements, Blueprint, CompiledSql, StatementKind};
use tracing::debug;

use crate::connection::Connection;
use crate::error::Result;

/// Runs DDL and schema introspection on a connection.
pub struct Schema<'c, C: Connection> {
    conn: &'c C,
}

impl<C: Connection> std::fmt::Debug for Schema<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("dialect", &self.conn.dialect())
            .finish()
    }
}

impl<'c, C: Connection> Schema<'c, C> {
    pub(crate) const fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    /// Returns the connection, for data changes alongside DDL.
    #[must_use]
    pub const fn connection(&self) -> &'c C {
        self.conn
    }

    /// Creates a table described by `build`.
    ///
    /// ```rust,no_run
    /// use quarry_db::{Connection, SqliteConnection};
    /// # async fn run(conn: &SqliteConnection) -> quarry_db::Result<()> {
    /// conn.schema()
    ///     .create_table("users", |table| {
    ///         table.increments("id");
    ///         table.string("email", 255).unique();
    ///         table.timestamps();
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a build error for an invalid blueprint, or the driver error.
    pub async fn create_table(&self, table: &str, build: impl FnOnce(&mut Blueprint)) -> Result<()> {
        let mut blueprint = Blueprint::create(table);
        build(&mut blueprint);
        self.apply(&blueprint).await
    }

    /// Alters a table with the changes described by `build`.
    ///
    /// # Errors
    ///
    /// See [`Schema::create_table`].
    pub async fn alter_table(&self, table: &str, build: impl FnOnce(&mut Blueprint)) -> Result<()> {
        let mut blueprint = Blueprint::alter(table);
        build(&mut blueprint);
        self.apply(&blueprint).await
    }

    /// Runs every statement a blueprint compiles to, in order.
    ///
    /// # Errors
    ///
    /// See [`Schema::create_table`].
    pub async fn apply(&self, blueprint: &Blueprint) -> Result<()> {
        let statements = self.conn.schema_grammar().compile_blueprint(blueprint)?;
        debug!(table = %blueprint.table(), statements = statements.len(), "Applying blueprint");
        for compiled in &statements {
            self.conn.run_query(compiled).await?;
        }
        Ok(())
    }

    /// Drops a table.
    ///
    /// # Errors
    ///
    /// Returns the driver error, including when the table does not exist.
    pub async fn drop_table(&self, table: &str) -> Result<()> {
        let compiled = self.conn.schema_grammar().compile_drop(table, false);
        self.conn.run_query(&compiled).await.map(drop)
    }

    /// Drops a table if it exists.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn drop_table_if_exists(&self, table: &str) -> Result<()> {
        let compiled = self.conn.schema_grammar().compile_drop(table, true);
        self.conn.run_query(&compiled).await.map(drop)
    }

    /// Renames a table.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        let compiled = self.conn.schema_grammar().compile_rename(from, to);
        self.conn.run_query(&compiled).await.map(drop)
    }

    /// Returns whether a table exists.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let compiled = self.conn.schema_grammar().compile_table_exists(table);
        self.positive_count(&compiled).await
    }

    /// Returns whether a table has a column.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let compiled = self.conn.schema_grammar().compile_column_exists(table, column);
        self.positive_count(&compiled).await
    }

    /// Lists user tables by name.
    ///
    /// # Errors
    ///
    /// Returns the driver error.
    pub async fn tables(&self) -> Result<Vec<String>> {
        let compiled = self.conn.schema_grammar().compile_tables();
        let result = self.conn.run_query(&compiled).await?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| row.get_str("name").map(str::to_string))
            .collect())
    }

    /// Runs a script of `;`-separated statements without bindings, splitting it
    /// with the string escape rules of the connection's dialect.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DbError::Tokenize`] for an unterminated literal, or the
    /// driver error of the first failing statement.
    pub async fn execute_raw(&self, sql: &str) -> Result<()> {
        let statements = split_statements(sql, self.conn.dialect().string_escapes())?;
        for statement in statements {
            let compiled = CompiledSql::raw(statement, StatementKind::Raw);
            self.conn.run_query(&compiled).await?;
        }
        Ok(())
    }

    async fn positive_count(&self, compiled: &CompiledSql) -> Result<bool> {
        let result = self.conn.run_query(compiled).await?;
        Ok(result
            .rows
            .first()
            .and_then(|row| row.get_i64("count"))
            .is_some_and(|count| count > 0))
    }
}
