//! Migration history tracking.
//!
//! This module manages the `migrations` table that records which migrations
//! have been applied, and in which batch.

use quarry_core::{Direction, Record};
use quarry_db::{Connection, Row};

use crate::error::Result;

/// Name of the tracking table.
pub const MIGRATIONS_TABLE: &str = "migrations";

/// A row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Row id.
    pub id: i64,
    /// Migration name.
    pub filename: String,
    /// Run that applied it.
    pub batch: i64,
    /// When it was applied, as stored by the database.
    pub created_at: Option<String>,
}

impl MigrationRecord {
    fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: row.get_i64("id")?,
            filename: row.get_str("filename")?.to_string(),
            batch: row.get_i64("batch")?,
            created_at: row.get("created_at").map(|value| match value {
                quarry_core::Parameter::Date(date) => date.to_rfc3339(),
                other => other.as_str().map(str::to_string).unwrap_or_default(),
            }),
        })
    }
}

/// Reads and writes the tracking table.
pub struct MigrationHistory<'c, C: Connection> {
    conn: &'c C,
}

impl<'c, C: Connection> MigrationHistory<'c, C> {
    /// Creates a history bound to a connection.
    pub const fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    /// Creates the tracking table if it is missing.
    pub async fn ensure_table(&self) -> Result<()> {
        let schema = self.conn.schema();
        if schema.table_exists(MIGRATIONS_TABLE).await? {
            return Ok(());
        }
        schema
            .create_table(MIGRATIONS_TABLE, |table| {
                table.id();
                table.string("filename", 255).unique();
                table.integer("batch");
                table.timestamps();
            })
            .await?;
        Ok(())
    }

    /// Returns every recorded migration in the order it was applied.
    pub async fn recorded(&self) -> Result<Vec<MigrationRecord>> {
        let mut query = self.conn.table(MIGRATIONS_TABLE);
        query.order_by("id", Direction::Asc);
        Ok(query
            .get()
            .await?
            .iter()
            .filter_map(MigrationRecord::from_row)
            .collect())
    }

    /// Returns the highest batch number, or 0 when nothing is recorded.
    pub async fn last_batch(&self) -> Result<i64> {
        Ok(self
            .recorded()
            .await?
            .iter()
            .map(|record| record.batch)
            .max()
            .unwrap_or(0))
    }

    /// Returns recorded migrations newest first, optionally limited to one
    /// batch or a number of rows.
    pub async fn newest_first(
        &self,
        batch: Option<i64>,
        limit: Option<u64>,
    ) -> Result<Vec<MigrationRecord>> {
        let mut query = self.conn.table(MIGRATIONS_TABLE);
        query
            .order_by("created_at", Direction::Desc)
            .order_by("id", Direction::Desc);
        if let Some(batch) = batch {
            query.where_op("batch", "=", batch)?;
        }
        if let Some(limit) = limit {
            query.limit(limit);
        }
        Ok(query
            .get()
            .await?
            .iter()
            .filter_map(MigrationRecord::from_row)
            .collect())
    }

    /// Records a migration as applied in `batch`.
    pub async fn record(&self, filename: &str, batch: i64) -> Result<()> {
        self.conn
            .table(MIGRATIONS_TABLE)
            .insert(&[Record::new().set("filename", filename).set("batch", batch)])
            .await?;
        Ok(())
    }

    /// Removes a migration's record. Returns whether a row was deleted.
    pub async fn remove(&self, filename: &str) -> Result<bool> {
        let mut query = self.conn.table(MIGRATIONS_TABLE);
        query.where_op("filename", "=", filename)?;
        Ok(query.delete().await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_db::SqliteConnection;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn conn() -> SqliteConnection {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        SqliteConnection::new(pool)
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let conn = conn().await;
        let history = MigrationHistory::new(&conn);
        history.ensure_table().await.unwrap();
        history.ensure_table().await.unwrap();
        assert!(conn.schema().table_exists(MIGRATIONS_TABLE).await.unwrap());
        assert!(conn.schema().has_column(MIGRATIONS_TABLE, "batch").await.unwrap());
        assert!(conn.schema().has_column(MIGRATIONS_TABLE, "updated_at").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_and_remove() {
        let conn = conn().await;
        let history = MigrationHistory::new(&conn);
        history.ensure_table().await.unwrap();
        assert_eq!(history.last_batch().await.unwrap(), 0);

        history.record("20240101000000_users", 1).await.unwrap();
        history.record("20240102000000_posts", 2).await.unwrap();
        history.record("20240103000000_tags", 2).await.unwrap();
        assert_eq!(history.last_batch().await.unwrap(), 2);

        let recorded = history.recorded().await.unwrap();
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[0].filename, "20240101000000_users");
        assert!(recorded[0].created_at.is_some());

        let newest: Vec<String> = history
            .newest_first(Some(2), None)
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.filename)
            .collect();
        assert_eq!(newest, vec!["20240103000000_tags", "20240102000000_posts"]);

        assert!(history.remove("20240103000000_tags").await.unwrap());
        assert!(!history.remove("20240103000000_tags").await.unwrap());
        assert_eq!(history.newest_first(None, Some(1)).await.unwrap().len(), 1);
    }
}
