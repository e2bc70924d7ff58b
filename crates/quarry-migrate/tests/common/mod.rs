#![allow(dead_code)]

use std::path::Path;

use quarry_db::SqliteConnection;
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

/// Writes `<name>.up.sql` and, if given, `<name>.down.sql`.
pub fn write_migration(dir: &Path, name: &str, up: &str, down: Option<&str>) {
    std::fs::write(dir.join(format!("{name}.up.sql")), up).unwrap();
    if let Some(down) = down {
        std::fs::write(dir.join(format!("{name}.down.sql")), down).unwrap();
    }
}

/// A directory with two reversible migrations creating `users` and `posts`.
pub fn sample_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_migration(
        dir.path(),
        "20240101000000_create_users",
        "create table users (id integer primary key, email text not null)",
        Some("drop table users"),
    );
    write_migration(
        dir.path(),
        "20240102000000_create_posts",
        "create table posts (id integer primary key, user_id integer not null);\n\
         create index posts_user_id_index on posts (user_id);",
        Some("drop table posts"),
    );
    dir
}
