//! The connection contract every driver implements.

use std::future::Future;
use std::sync::Arc;

use quarry_core::{validate_identifier, CompiledSql, Dialect, QueryGrammar, SchemaGrammar};
use tokio::sync::broadcast;

use crate::cursor::Cursor;
use crate::error::Result;
use crate::event::ConnectionEvent;
use crate::query::BoundQuery;
use crate::row::QueryResult;
use crate::schema::Schema;

/// Rows fetched per round trip by cursors when the caller has no preference.
pub const DEFAULT_CURSOR_BATCH: usize = 100;

/// A database connection: one pinned client from a pool plus the grammars
/// of its dialect.
///
/// State moves `Disconnected -> Connected -> InTransaction -> Connected ->
/// Disconnected`. Running a statement while disconnected connects first.
pub trait Connection: Send + Sync + Sized {
    /// Returns the dialect.
    fn dialect(&self) -> Dialect;

    /// Returns the query grammar.
    fn query_grammar(&self) -> Arc<dyn QueryGrammar> {
        self.dialect().query_grammar()
    }

    /// Returns the schema grammar.
    fn schema_grammar(&self) -> Arc<dyn SchemaGrammar> {
        self.dialect().schema_grammar()
    }

    /// Whether [`Connection::run_cursor`] streams from the server. When false
    /// the whole result is buffered in memory.
    fn supports_server_cursor(&self) -> bool {
        false
    }

    /// Subscribes to lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent>;

    /// Checks a client out of the pool.
    fn connect(&self) -> impl Future<Output = Result<()>> + Send;

    /// Rolls back any open transaction and releases the client.
    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send;

    /// Returns whether a client is pinned.
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    /// Returns whether a transaction is open.
    fn in_transaction(&self) -> impl Future<Output = bool> + Send;

    /// Runs a compiled statement.
    fn run_query(&self, compiled: &CompiledSql) -> impl Future<Output = Result<QueryResult>> + Send;

    /// Runs a compiled query and returns a cursor over its rows.
    fn run_cursor(
        &self,
        compiled: &CompiledSql,
        batch_size: usize,
    ) -> impl Future<Output = Result<Cursor>> + Send;

    /// Opens a transaction.
    fn begin_transaction(&self) -> impl Future<Output = Result<()>> + Send;

    /// Commits the open transaction.
    fn commit(&self) -> impl Future<Output = Result<()>> + Send;

    /// Rolls back the open transaction.
    fn rollback(&self) -> impl Future<Output = Result<()>> + Send;

    /// Creates a database. The name is validated before any SQL is built.
    fn create_database(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Drops a database. The name is validated before any SQL is built.
    fn drop_database(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Returns an empty query bound to this connection.
    fn query(&self) -> BoundQuery<'_, Self> {
        BoundQuery::new(self)
    }

    /// Returns a query on `table` bound to this connection.
    fn table(&self, table: &str) -> BoundQuery<'_, Self> {
        let mut query = BoundQuery::new(self);
        query.table(table);
        query
    }

    /// Returns the schema builder bound to this connection.
    fn schema(&self) -> Schema<'_, Self> {
        Schema::new(self)
    }
}

/// Validates a database name, then compiles its `create` or `drop` statement.
pub(crate) fn database_statement(
    grammar: &dyn SchemaGrammar,
    name: &str,
    create: bool,
) -> Result<CompiledSql> {
    validate_identifier(name)?;
    let compiled = if create {
        grammar.compile_create_database(name)?
    } else {
        grammar.compile_drop_database(name)?
    };
    Ok(compiled)
}
