//! Queries bound to a connection.

use std::ops::{Deref, DerefMut};

use quarry_core::{InsertGetIdOptions, Parameter, Query, Record};

use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::row::{QueryResult, Row};

/// A [`Query`] that knows which connection runs it.
///
/// Derefs to the query, so every builder method is available directly:
///
/// ```rust,no_run
/// use quarry_db::{Connection, SqliteConnection};
/// # async fn run(conn: &SqliteConnection) -> quarry_db::Result<()> {
/// let mut query = conn.table("users");
/// query.where_op("active", "=", true)?.limit(10);
/// let rows = query.get().await?;
/// # Ok(())
/// # }
/// ```
pub struct BoundQuery<'c, C: Connection> {
    conn: &'c C,
    query: Query,
}

impl<C: Connection> std::fmt::Debug for BoundQuery<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.query.fmt(f)
    }
}

impl<C: Connection> Deref for BoundQuery<'_, C> {
    type Target = Query;

    fn deref(&self) -> &Query {
        &self.query
    }
}

impl<C: Connection> DerefMut for BoundQuery<'_, C> {
    fn deref_mut(&mut self) -> &mut Query {
        &mut self.query
    }
}

impl<'c, C: Connection> BoundQuery<'c, C> {
    pub(crate) fn new(conn: &'c C) -> Self {
        Self {
            conn,
            query: Query::new(conn.query_grammar()),
        }
    }

    /// Returns the unbound query.
    #[must_use]
    pub fn into_query(self) -> Query {
        self.query
    }

    /// Runs the select and returns every row.
    ///
    /// # Errors
    ///
    /// Returns a build error or the driver error.
    pub async fn get(&self) -> Result<Vec<Row>> {
        let compiled = self.query.to_sql()?;
        Ok(self.conn.run_query(&compiled).await?.rows)
    }

    /// Runs the select with `limit 1`.
    ///
    /// # Errors
    ///
    /// See [`BoundQuery::get`].
    pub async fn first(&self) -> Result<Option<Row>> {
        let mut query = self.query.clone();
        query.limit(1);
        let compiled = query.to_sql()?;
        Ok(self.conn.run_query(&compiled).await?.rows.into_iter().next())
    }

    /// Counts the rows the select would return.
    ///
    /// # Errors
    ///
    /// See [`BoundQuery::get`].
    pub async fn count(&self) -> Result<i64> {
        let compiled = self.query.compile_count()?;
        let result = self.conn.run_query(&compiled).await?;
        Ok(result
            .rows
            .first()
            .and_then(|row| row.get_i64("count"))
            .unwrap_or(0))
    }

    /// Returns whether the select matches any row.
    ///
    /// # Errors
    ///
    /// See [`BoundQuery::get`].
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.count().await? > 0)
    }

    /// Runs the select through a cursor fetching `batch_size` rows at a time.
    ///
    /// # Errors
    ///
    /// See [`BoundQuery::get`].
    pub async fn get_cursor(&self, batch_size: usize) -> Result<Cursor> {
        let compiled = self.query.to_sql()?;
        self.conn.run_cursor(&compiled, batch_size).await
    }

    /// Inserts rows.
    ///
    /// # Errors
    ///
    /// Returns [`quarry_core::BuildError::EmptyInsert`] for no rows, or the
    /// driver error.
    pub async fn insert(&self, rows: &[Record]) -> Result<QueryResult> {
        let compiled = self.query.compile_insert(rows)?;
        self.conn.run_query(&compiled).await
    }

    /// Inserts one row and returns its generated keys.
    ///
    /// # Errors
    ///
    /// See [`BoundQuery::insert`].
    pub async fn insert_get_id(
        &self,
        row: &Record,
        options: &InsertGetIdOptions,
    ) -> Result<Vec<Parameter>> {
        let compiled = self.query.compile_insert_get_id(row, options)?;
        Ok(self.conn.run_query(&compiled).await?.inserted_ids)
    }

    /// Updates the matched rows and returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns [`quarry_core::BuildError::EmptyUpdate`] for no values, or the
    /// driver error.
    pub async fn update(&self, values: &Record) -> Result<u64> {
        let compiled = self.query.compile_update(values)?;
        Ok(self.conn.run_query(&compiled).await?.rows_affected)
    }

    /// Inserts rows, updating `update` columns where `conflict` collides.
    ///
    /// # Errors
    ///
    /// See [`BoundQuery::insert`].
    pub async fn upsert(&self, rows: &[Record], conflict: &[&str], update: &[&str]) -> Result<u64> {
        let compiled = self.query.compile_upsert(rows, conflict, update)?;
        Ok(self.conn.run_query(&compiled).await?.rows_affected)
    }

    /// Deletes the matched rows and returns how many were removed.
    ///
    /// # Errors
    ///
    /// See [`BoundQuery::get`].
    pub async fn delete(&self) -> Result<u64> {
        let compiled = self.query.compile_delete()?;
        Ok(self.conn.run_query(&compiled).await?.rows_affected)
    }
}
