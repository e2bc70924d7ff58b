mod common;

use common::*;
use futures::TryStreamExt;
use quarry_core::{Direction, InsertGetIdOptions, Parameter, Record};
use quarry_db::{Connection, ConnectionEvent, DbError, DEFAULT_CURSOR_BATCH};

#[tokio::test]
async fn connects_lazily_and_disconnects() {
    let conn = memory().await;
    assert!(!conn.is_connected().await);

    assert_eq!(conn.table("sqlite_master").count().await.unwrap(), 0);
    assert!(conn.is_connected().await);

    conn.disconnect().await.unwrap();
    assert!(!conn.is_connected().await);
    // Disconnecting twice is a no-op.
    conn.disconnect().await.unwrap();
}

#[tokio::test]
async fn insert_and_select() {
    let conn = with_users().await;
    let result = conn
        .table("users")
        .insert(&[user("Ada", "ada@example.com", 36), user("Alan", "alan@example.com", 41)])
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 2);

    let mut query = conn.table("users");
    query
        .select(["name", "age"])
        .where_op("age", ">", 40)
        .unwrap()
        .order_by("name", Direction::Asc);
    let rows = query.get().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_str("name"), Some("Alan"));
    assert_eq!(rows[0].get("age"), Some(&Parameter::Int(41)));
}

#[tokio::test]
async fn count_on_empty_table_is_zero() {
    let conn = with_users().await;
    assert_eq!(conn.table("users").count().await.unwrap(), 0);
    assert!(!conn.table("users").exists().await.unwrap());
    assert!(conn.table("users").first().await.unwrap().is_none());
}

#[tokio::test]
async fn insert_get_id_returns_generated_keys() {
    let conn = with_users().await;
    let first = conn
        .table("users")
        .insert_get_id(&user("Ada", "ada@example.com", 36), &InsertGetIdOptions::default())
        .await
        .unwrap();
    let second = conn
        .table("users")
        .insert_get_id(&user("Alan", "alan@example.com", 41), &InsertGetIdOptions::default())
        .await
        .unwrap();
    assert_eq!(first, vec![Parameter::Int(1)]);
    assert_eq!(second, vec![Parameter::Int(2)]);
}

#[tokio::test]
async fn null_values_round_trip() {
    let conn = with_users().await;
    conn.table("users")
        .insert(&[Record::new()
            .set("name", "Grace")
            .set("email", "grace@example.com")
            .set("age", Parameter::Null)])
        .await
        .unwrap();

    let mut query = conn.table("users");
    query.where_null("age");
    let row = query.first().await.unwrap().unwrap();
    assert_eq!(row.get("age"), Some(&Parameter::Null));
}

#[tokio::test]
async fn update_and_delete_report_counts() {
    let conn = with_users().await;
    conn.table("users")
        .insert(&[
            user("Ada", "ada@example.com", 36),
            user("Alan", "alan@example.com", 41),
            user("Grace", "grace@example.com", 85),
        ])
        .await
        .unwrap();

    let mut older = conn.table("users");
    older.where_op("age", ">", 40).unwrap();
    let updated = older
        .update(&Record::new().set("name", "Senior"))
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let mut ada = conn.table("users");
    ada.where_op("email", "=", "ada@example.com").unwrap();
    assert_eq!(ada.delete().await.unwrap(), 1);
    assert_eq!(ada.delete().await.unwrap(), 0);
    assert_eq!(conn.table("users").count().await.unwrap(), 2);
}

#[tokio::test]
async fn upsert_updates_on_conflict() {
    let conn = with_users().await;
    conn.table("users")
        .insert(&[user("Ada", "ada@example.com", 36)])
        .await
        .unwrap();

    conn.table("users")
        .upsert(
            &[
                user("Ada Lovelace", "ada@example.com", 37),
                user("Alan", "alan@example.com", 41),
            ],
            &["email"],
            &["name", "age"],
        )
        .await
        .unwrap();

    assert_eq!(conn.table("users").count().await.unwrap(), 2);
    let mut ada = conn.table("users");
    ada.where_op("email", "=", "ada@example.com").unwrap();
    let row = ada.first().await.unwrap().unwrap();
    assert_eq!(row.get_str("name"), Some("Ada Lovelace"));
    assert_eq!(row.get_i64("age"), Some(37));
}

#[tokio::test]
async fn rollback_discards_writes() {
    let conn = with_users().await;
    conn.begin_transaction().await.unwrap();
    assert!(conn.in_transaction().await);
    conn.table("users")
        .insert(&[user("Ada", "ada@example.com", 36)])
        .await
        .unwrap();
    // The transaction sees its own write.
    assert_eq!(conn.table("users").count().await.unwrap(), 1);
    conn.rollback().await.unwrap();

    assert!(!conn.in_transaction().await);
    assert_eq!(conn.table("users").count().await.unwrap(), 0);
}

#[tokio::test]
async fn commit_keeps_writes() {
    let conn = with_users().await;
    conn.begin_transaction().await.unwrap();
    conn.table("users")
        .insert(&[user("Ada", "ada@example.com", 36)])
        .await
        .unwrap();
    conn.commit().await.unwrap();
    assert_eq!(conn.table("users").count().await.unwrap(), 1);
}

#[tokio::test]
async fn transaction_state_errors() {
    let conn = with_users().await;
    assert!(matches!(conn.commit().await, Err(DbError::NoActiveTransaction)));
    assert!(matches!(conn.rollback().await, Err(DbError::NoActiveTransaction)));

    conn.begin_transaction().await.unwrap();
    assert!(matches!(
        conn.begin_transaction().await,
        Err(DbError::TransactionAlreadyActive)
    ));
    conn.rollback().await.unwrap();
}

#[tokio::test]
async fn disconnect_rolls_back_open_transaction() {
    let conn = with_users().await;
    conn.begin_transaction().await.unwrap();
    conn.table("users")
        .insert(&[user("Ada", "ada@example.com", 36)])
        .await
        .unwrap();
    conn.disconnect().await.unwrap();

    assert!(!conn.in_transaction().await);
    assert_eq!(conn.table("users").count().await.unwrap(), 0);
}

#[tokio::test]
async fn driver_errors_propagate() {
    let conn = with_users().await;
    conn.table("users")
        .insert(&[user("Ada", "ada@example.com", 36)])
        .await
        .unwrap();
    let duplicate = conn
        .table("users")
        .insert(&[user("Ada", "ada@example.com", 36)])
        .await;
    assert!(matches!(duplicate, Err(DbError::Database(_))));
}

#[tokio::test]
async fn buffered_cursor_yields_every_row() {
    let conn = with_users().await;
    let rows: Vec<Record> = (0..25)
        .map(|i| user(&format!("user{i}"), &format!("user{i}@example.com"), i))
        .collect();
    conn.table("users").insert(&rows).await.unwrap();

    let mut query = conn.table("users");
    query.order_by("id", Direction::Asc);
    let mut cursor = query.get_cursor(10).await.unwrap();
    assert!(!cursor.is_server_side());
    assert_eq!(cursor.next_batch(10).await.unwrap().len(), 10);
    assert_eq!(cursor.next_batch(10).await.unwrap().len(), 10);
    assert_eq!(cursor.next_batch(10).await.unwrap().len(), 5);
    assert!(cursor.next().await.unwrap().is_none());

    let streamed: Vec<_> = query
        .get_cursor(DEFAULT_CURSOR_BATCH)
        .await
        .unwrap()
        .into_stream()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(streamed.len(), 25);
    assert_eq!(streamed[0].get_i64("id"), Some(1));
}

#[tokio::test]
async fn events_are_published() {
    let conn = memory().await;
    let mut events = conn.subscribe();

    conn.table("sqlite_master").count().await.unwrap();
    conn.disconnect().await.unwrap();

    assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Connect);
    match events.recv().await.unwrap() {
        ConnectionEvent::Query { sql, bindings, .. } => {
            assert_eq!(sql, "select count(*) as count from sqlite_master");
            assert!(bindings.is_empty());
        }
        other => panic!("expected a query event, got {other:?}"),
    }
    assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Disconnect);
}

#[tokio::test]
async fn failures_publish_error_events() {
    let conn = memory().await;
    let mut events = conn.subscribe();

    assert!(conn.commit().await.is_err());
    assert!(matches!(
        events.recv().await.unwrap(),
        ConnectionEvent::Error { .. }
    ));
}
