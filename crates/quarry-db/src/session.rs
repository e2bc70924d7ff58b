//! The pinned client behind a connection.
//!
//! A [`Session`] holds at most one client checked out of the pool. It is
//! acquired lazily by the first statement and released by `disconnect`. All
//! statements of a connection run on that one client, so a transaction opened
//! with `begin_transaction` sees its own writes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use quarry_core::Parameter;
use sqlx::pool::PoolConnection;
use sqlx::{Database, Executor, Pool};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::{DbError, Result};
use crate::event::{ConnectionEvent, EventBus};

/// Transaction state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// Statements autocommit.
    #[default]
    Idle,
    /// Opened by `begin_transaction`.
    Explicit,
    /// Opened implicitly to host server-side cursors.
    Cursor,
}

/// A pool handle plus the client pinned from it.
pub(crate) struct Session<DB: Database> {
    pool: Pool<DB>,
    client: Option<PoolConnection<DB>>,
    state: TransactionState,
    open_cursors: usize,
    cursor_seq: u64,
    acquire_timeout: Duration,
    events: EventBus,
}

impl<DB: Database> Session<DB>
where
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
{
    pub(crate) const fn new(pool: Pool<DB>, acquire_timeout: Duration, events: EventBus) -> Self {
        Self {
            pool,
            client: None,
            state: TransactionState::Idle,
            open_cursors: 0,
            cursor_seq: 0,
            acquire_timeout,
            events,
        }
    }

    pub(crate) const fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub(crate) const fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks a client out of the pool if none is pinned.
    pub(crate) async fn connect(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }
        let client = match self.pool.acquire().await {
            Ok(client) => client,
            Err(sqlx::Error::PoolTimedOut) => {
                return Err(DbError::AcquireTimeout(self.acquire_timeout));
            }
            Err(err) => return Err(err.into()),
        };
        self.client = Some(client);
        self.events.emit(ConnectionEvent::Connect);
        Ok(())
    }

    /// Returns the pinned client, connecting first if needed.
    pub(crate) async fn client(&mut self) -> Result<&mut DB::Connection> {
        self.connect().await?;
        self.client.as_deref_mut().ok_or(DbError::NotConnected)
    }

    /// Rolls back anything open and returns the client to the pool.
    pub(crate) async fn disconnect(&mut self) -> Result<()> {
        if self.client.is_none() {
            return Ok(());
        }
        if self.state != TransactionState::Idle {
            debug!("Rolling back open transaction before disconnect");
            if let Err(err) = self.control("ROLLBACK").await {
                // The client is in an unknown state; do not hand it back.
                warn!(error = %err, "Rollback on disconnect failed, closing client");
                if let Some(client) = self.client.take() {
                    drop(client.detach());
                }
            }
            self.state = TransactionState::Idle;
            self.open_cursors = 0;
        }
        self.client = None;
        self.events.emit(ConnectionEvent::Disconnect);
        Ok(())
    }

    pub(crate) async fn begin(&mut self) -> Result<()> {
        if self.state != TransactionState::Idle {
            return Err(DbError::TransactionAlreadyActive);
        }
        self.control("BEGIN").await?;
        self.state = TransactionState::Explicit;
        Ok(())
    }

    pub(crate) async fn commit(&mut self) -> Result<()> {
        if self.state != TransactionState::Explicit {
            return Err(DbError::NoActiveTransaction);
        }
        self.control("COMMIT").await?;
        self.state = TransactionState::Idle;
        Ok(())
    }

    pub(crate) async fn rollback(&mut self) -> Result<()> {
        if self.state != TransactionState::Explicit {
            return Err(DbError::NoActiveTransaction);
        }
        self.control("ROLLBACK").await?;
        self.state = TransactionState::Idle;
        Ok(())
    }

    /// Registers a cursor, opening a transaction for it if none is active.
    /// Returns the cursor's sequence number.
    pub(crate) async fn open_cursor(&mut self) -> Result<u64> {
        if self.state == TransactionState::Idle {
            self.control("BEGIN").await?;
            self.state = TransactionState::Cursor;
        }
        self.open_cursors += 1;
        self.cursor_seq += 1;
        Ok(self.cursor_seq)
    }

    /// Unregisters a cursor, committing the transaction it opened once the
    /// last cursor is gone.
    pub(crate) async fn release_cursor(&mut self) -> Result<()> {
        self.open_cursors = self.open_cursors.saturating_sub(1);
        if self.open_cursors == 0 && self.state == TransactionState::Cursor {
            self.control("COMMIT").await?;
            self.state = TransactionState::Idle;
        }
        Ok(())
    }

    async fn control(&mut self, statement: &'static str) -> Result<()> {
        let client = self.client().await?;
        client.execute(statement).await?;
        Ok(())
    }
}

impl<DB: Database> Drop for Session<DB> {
    fn drop(&mut self) {
        if self.state != TransactionState::Idle {
            // Never return a client with an open transaction to the pool.
            if let Some(client) = self.client.take() {
                warn!("Connection dropped inside a transaction, closing client");
                drop(client.detach());
            }
        }
    }
}

/// The part of a connection shared with its cursors.
pub(crate) struct SessionHandle<DB: Database> {
    session: Arc<Mutex<Session<DB>>>,
    events: EventBus,
}

impl<DB: Database> Clone for SessionHandle<DB> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            events: self.events.clone(),
        }
    }
}

impl<DB: Database> SessionHandle<DB>
where
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
{
    pub(crate) fn new(pool: Pool<DB>, acquire_timeout: Duration, events: EventBus) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new(
                pool,
                acquire_timeout,
                events.clone(),
            ))),
            events,
        }
    }

    pub(crate) const fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Session<DB>> {
        self.session.lock().await
    }

    pub(crate) fn shared(&self) -> Arc<Mutex<Session<DB>>> {
        Arc::clone(&self.session)
    }

    pub(crate) async fn connect(&self) -> Result<()> {
        let result = self.lock().await.connect().await;
        self.observe(result)
    }

    pub(crate) async fn disconnect(&self) -> Result<()> {
        let result = self.lock().await.disconnect().await;
        self.observe(result)
    }

    pub(crate) async fn is_connected(&self) -> bool {
        self.lock().await.is_connected()
    }

    pub(crate) async fn in_transaction(&self) -> bool {
        self.lock().await.state() != TransactionState::Idle
    }

    pub(crate) async fn begin(&self) -> Result<()> {
        let result = self.lock().await.begin().await;
        self.observe(result)
    }

    pub(crate) async fn commit(&self) -> Result<()> {
        let result = self.lock().await.commit().await;
        self.observe(result)
    }

    pub(crate) async fn rollback(&self) -> Result<()> {
        let result = self.lock().await.rollback().await;
        self.observe(result)
    }

    /// Publishes a query event on success or an error event on failure.
    ///
    /// `bindings` are the values actually sent with `sql`.
    pub(crate) fn record<'p, T>(
        &self,
        sql: &str,
        bindings: impl IntoIterator<Item = &'p Parameter>,
        started: Instant,
        result: Result<T>,
    ) -> Result<T> {
        if result.is_ok() {
            self.events.emit(ConnectionEvent::Query {
                sql: sql.to_string(),
                bindings: bindings.into_iter().cloned().collect(),
                elapsed: started.elapsed(),
            });
        }
        self.observe(result)
    }

    /// Publishes an error event for a failed result.
    pub(crate) fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.events.error(err);
        }
        result
    }
}
