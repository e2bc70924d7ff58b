//! # quarry-db
//!
//! Runs [`quarry_core`] queries and blueprints on PostgreSQL, MySQL and
//! SQLite through sqlx.
//!
//! Each [`Connection`] pins one client from a pool for its lifetime, so a
//! transaction opened with [`Connection::begin_transaction`] covers every
//! statement that follows until it is committed or rolled back.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quarry_core::Record;
//! use quarry_db::{AnyConnection, Connection, PoolConfig};
//!
//! # async fn run() -> quarry_db::Result<()> {
//! let conn = AnyConnection::open("sqlite::memory:", &PoolConfig::default()).await?;
//!
//! conn.schema()
//!     .create_table("users", |table| {
//!         table.increments("id");
//!         table.string("name", 100);
//!     })
//!     .await?;
//!
//! conn.begin_transaction().await?;
//! conn.table("users")
//!     .insert(&[Record::new().set("name", "Ada")])
//!     .await?;
//! conn.commit().await?;
//!
//! let mut query = conn.table("users");
//! query.where_op("name", "=", "Ada")?;
//! assert_eq!(query.count().await?, 1);
//! # Ok(())
//! # }
//! ```

mod any;
mod config;
mod connection;
mod convert;
mod cursor;
mod error;
mod event;
mod mysql;
mod postgres;
mod query;
mod row;
mod schema;
mod session;
mod sqlite;

pub use any::{dialect_for_url, AnyConnection};
pub use config::PoolConfig;
pub use connection::{Connection, DEFAULT_CURSOR_BATCH};
pub use cursor::Cursor;
pub use error::{DbError, Result};
pub use event::ConnectionEvent;
pub use mysql::MySqlConnection;
pub use postgres::PostgresConnection;
pub use query::BoundQuery;
pub use row::{QueryResult, Row};
pub use schema::Schema;
pub use session::TransactionState;
pub use sqlite::SqliteConnection;
