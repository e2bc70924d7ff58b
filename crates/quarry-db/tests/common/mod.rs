#![allow(dead_code)]

use quarry_core::Record;
use quarry_db::{Connection, SqliteConnection};
use sqlx::sqlite::SqlitePoolOptions;

/// Returns a connection to a private in-memory database.
pub async fn memory() -> SqliteConnection {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    SqliteConnection::new(pool)
}

/// Returns a connection with a `users (id, name, email unique, age)` table.
pub async fn with_users() -> SqliteConnection {
    let conn = memory().await;
    conn.schema()
        .create_table("users", |table| {
            table.increments("id");
            table.string("name", 100);
            table.string("email", 255).unique();
            table.integer("age").nullable();
        })
        .await
        .unwrap();
    conn
}

pub fn user(name: &str, email: &str, age: i64) -> Record {
    Record::new()
        .set("name", name)
        .set("email", email)
        .set("age", age)
}
