mod common;

use common::*;
use quarry_core::{Blueprint, Direction, IdentifierError, Parameter, Record};
use quarry_db::{Connection, DbError};

#[tokio::test]
async fn create_exists_drop() {
    let conn = memory().await;
    let schema = conn.schema();
    assert!(!schema.table_exists("posts").await.unwrap());

    schema
        .create_table("posts", |table| {
            table.increments("id");
            table.string("title", 200);
            table.boolean("published").default(false);
            table.timestamps();
        })
        .await
        .unwrap();
    assert!(schema.table_exists("posts").await.unwrap());

    schema.drop_table("posts").await.unwrap();
    assert!(!schema.table_exists("posts").await.unwrap());
    schema.drop_table_if_exists("posts").await.unwrap();
    assert!(schema.drop_table("posts").await.is_err());
}

#[tokio::test]
async fn defaults_are_applied() {
    let conn = memory().await;
    conn.schema()
        .create_table("posts", |table| {
            table.increments("id");
            table.string("title", 200);
            table.boolean("published").default(false);
            table.timestamps();
        })
        .await
        .unwrap();
    conn.table("posts")
        .insert(&[Record::new().set("title", "Hello")])
        .await
        .unwrap();

    let row = conn.table("posts").first().await.unwrap().unwrap();
    assert_eq!(row.get("published"), Some(&Parameter::Int(0)));
    assert!(matches!(row.get("created_at"), Some(Parameter::Text(_))));
}

#[tokio::test]
async fn has_column_and_alter() {
    let conn = with_users().await;
    let schema = conn.schema();
    assert!(schema.has_column("users", "email").await.unwrap());
    assert!(!schema.has_column("users", "bio").await.unwrap());

    schema
        .alter_table("users", |table| {
            table.text("bio").nullable();
        })
        .await
        .unwrap();
    assert!(schema.has_column("users", "bio").await.unwrap());
}

#[tokio::test]
async fn tables_lists_user_tables() {
    let conn = with_users().await;
    let schema = conn.schema();
    schema
        .create_table("audit", |table| {
            table.increments("id");
        })
        .await
        .unwrap();
    schema.rename_table("audit", "audit_log").await.unwrap();

    assert_eq!(schema.tables().await.unwrap(), vec!["audit_log", "users"]);
}

#[tokio::test]
async fn indexes_are_created() {
    let conn = memory().await;
    let mut blueprint = Blueprint::create("tags");
    blueprint.increments("id");
    blueprint.string("slug", 50);
    blueprint.unique_index(["slug"]);
    conn.schema().apply(&blueprint).await.unwrap();

    conn.table("tags")
        .insert(&[Record::new().set("slug", "rust")])
        .await
        .unwrap();
    let duplicate = conn
        .table("tags")
        .insert(&[Record::new().set("slug", "rust")])
        .await;
    assert!(matches!(duplicate, Err(DbError::Database(_))));
}

#[tokio::test]
async fn execute_raw_runs_each_statement() {
    let conn = memory().await;
    conn.schema()
        .execute_raw(
            "create table notes (body text); \
             insert into notes (body) values ('a; b'); \
             insert into notes (body) values ('c');",
        )
        .await
        .unwrap();
    assert_eq!(conn.table("notes").count().await.unwrap(), 2);
}

#[tokio::test]
async fn execute_raw_keeps_backslashes_literal_on_sqlite() {
    let conn = memory().await;
    conn.schema()
        .execute_raw(
            "create table paths (p text); \
             insert into paths (p) values ('C:\\'); \
             insert into paths (p) values ('D:');",
        )
        .await
        .unwrap();

    let mut query = conn.table("paths");
    query.order_by("p", Direction::Asc);
    let rows = query.get().await.unwrap();
    let paths: Vec<&str> = rows.iter().filter_map(|row| row.get_str("p")).collect();
    assert_eq!(paths, vec!["C:\\", "D:"]);
}

#[tokio::test]
async fn execute_raw_rejects_unterminated_literal() {
    let conn = memory().await;
    let result = conn.schema().execute_raw("select 'oops").await;
    assert!(matches!(result, Err(DbError::Tokenize(_))));
}

#[tokio::test]
async fn create_database_rejects_bad_names() {
    let dir = tempfile::tempdir().unwrap();
    let conn = memory().await.with_database_dir(dir.path());

    let err = conn.create_database("users; DROP TABLE x").await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Identifier(IdentifierError::InvalidCharacter { .. })
    ));
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn create_and_drop_database_files() {
    let dir = tempfile::tempdir().unwrap();
    let conn = memory().await.with_database_dir(dir.path());

    conn.create_database("valid_name_1").await.unwrap();
    let path = dir.path().join("valid_name_1.sqlite3");
    assert!(path.exists());

    conn.drop_database("valid_name_1").await.unwrap();
    assert!(!path.exists());
    assert!(matches!(
        conn.drop_database("valid_name_1").await,
        Err(DbError::Io(_))
    ));
}
