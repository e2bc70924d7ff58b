//! Row cursors.
//!
//! A cursor either streams batches from a server-side cursor (PostgreSQL) or
//! walks a fully buffered result. [`Cursor::is_server_side`] tells which.

use std::collections::VecDeque;

use futures::stream::{self, Stream};

use crate::error::{DbError, Result};
use crate::postgres::ServerCursor;
use crate::row::Row;

enum Source {
    Buffered(VecDeque<Row>),
    Server {
        cursor: ServerCursor,
        buffer: VecDeque<Row>,
    },
    Exhausted,
    Closed,
}

/// Iterates over the rows of a query.
pub struct Cursor {
    source: Source,
    server_side: bool,
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.source {
            Source::Buffered(rows) => format!("buffered({})", rows.len()),
            Source::Server { buffer, .. } => format!("server({} buffered)", buffer.len()),
            Source::Exhausted => "exhausted".to_string(),
            Source::Closed => "closed".to_string(),
        };
        f.debug_struct("Cursor")
            .field("server_side", &self.server_side)
            .field("state", &state)
            .finish()
    }
}

impl Cursor {
    /// Wraps rows that were fetched in full.
    #[must_use]
    pub fn buffered(rows: Vec<Row>) -> Self {
        Self {
            source: Source::Buffered(rows.into()),
            server_side: false,
        }
    }

    pub(crate) fn server(cursor: ServerCursor) -> Self {
        Self {
            source: Source::Server {
                cursor,
                buffer: VecDeque::new(),
            },
            server_side: true,
        }
    }

    /// Returns whether rows are streamed from a server-side cursor.
    #[must_use]
    pub const fn is_server_side(&self) -> bool {
        self.server_side
    }

    /// Returns the next row, or `None` once the result is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::CursorClosed`] after [`Cursor::close`], or the
    /// driver error of a failed fetch.
    pub async fn next(&mut self) -> Result<Option<Row>> {
        loop {
            match &mut self.source {
                Source::Buffered(rows) => {
                    if let Some(row) = rows.pop_front() {
                        return Ok(Some(row));
                    }
                    self.source = Source::Exhausted;
                }
                Source::Server { cursor, buffer } => {
                    if let Some(row) = buffer.pop_front() {
                        return Ok(Some(row));
                    }
                    if cursor.is_exhausted() {
                        cursor.close().await?;
                        self.source = Source::Exhausted;
                    } else {
                        buffer.extend(cursor.fetch().await?);
                    }
                }
                Source::Exhausted => return Ok(None),
                Source::Closed => return Err(DbError::CursorClosed),
            }
        }
    }

    /// Returns up to `max` rows; an empty batch means the end.
    ///
    /// # Errors
    ///
    /// See [`Cursor::next`].
    pub async fn next_batch(&mut self, max: usize) -> Result<Vec<Row>> {
        let mut batch = Vec::with_capacity(max.min(1024));
        while batch.len() < max {
            match self.next().await? {
                Some(row) => batch.push(row),
                None => break,
            }
        }
        Ok(batch)
    }

    /// Releases the cursor. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the driver error if the server-side cursor cannot be closed.
    pub async fn close(&mut self) -> Result<()> {
        if let Source::Server { cursor, .. } = &mut self.source {
            cursor.close().await?;
        }
        self.source = Source::Closed;
        Ok(())
    }

    /// Turns the cursor into a stream of rows.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row>> + Send {
        stream::try_unfold(self, |mut cursor| async move {
            Ok(cursor.next().await?.map(|row| (row, cursor)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use quarry_core::Parameter;

    fn rows(n: i64) -> Vec<Row> {
        (0..n)
            .map(|i| Row::new(vec!["n".into()], vec![Parameter::Int(i)]))
            .collect()
    }

    #[tokio::test]
    async fn test_buffered_next_and_batches() {
        let mut cursor = Cursor::buffered(rows(5));
        assert!(!cursor.is_server_side());

        let first = cursor.next().await.unwrap().unwrap();
        assert_eq!(first.get("n"), Some(&Parameter::Int(0)));

        assert_eq!(cursor.next_batch(3).await.unwrap().len(), 3);
        assert_eq!(cursor.next_batch(3).await.unwrap().len(), 1);
        assert!(cursor.next_batch(3).await.unwrap().is_empty());
        assert!(cursor.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_cursor_errors() {
        let mut cursor = Cursor::buffered(rows(2));
        cursor.close().await.unwrap();
        cursor.close().await.unwrap();
        assert!(matches!(cursor.next().await, Err(DbError::CursorClosed)));
    }

    #[tokio::test]
    async fn test_into_stream() {
        let collected: Vec<Row> = Cursor::buffered(rows(4))
            .into_stream()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(collected.len(), 4);
    }
}
