//! Cross-dialect compilation tests: clause ordering, binding alignment,
//! batch inserts, upserts and counts.

mod common;
use common::*;

use quarry_core::{
    BuildError, Conjunction, Dialect, Expression, JoinOn, Parameter, PlaceholderStyle, Record,
    StatementKind,
};

#[test]
fn region_country_example_compiles_in_order() {
    for dialect in DIALECTS {
        let mut q = query(dialect, "users");
        q.where_op("region_id", "=", 2)
            .unwrap()
            .where_op_with("country_id", "=", "BE", Conjunction::Or, true)
            .unwrap();
        let compiled = q.to_sql().unwrap();

        assert!(compiled
            .sql()
            .ends_with("where region_id = ? or not country_id = ?"));
        assert_eq!(
            compiled.bindings(),
            &[Parameter::Int(2), Parameter::Text("BE".into())]
        );
    }
}

#[test]
fn postgres_numbers_placeholders_at_render_time() {
    let mut q = query(Dialect::Postgres, "users");
    q.where_op("region_id", "=", 2)
        .unwrap()
        .or_where_not_op("country_id", "=", "BE")
        .unwrap();
    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.render(PlaceholderStyle::Numbered),
        "select * from users where region_id = $1 or not country_id = $2"
    );
    assert_eq!(compiled.render(PlaceholderStyle::QuestionMark), compiled.sql());
}

#[test]
fn bindings_match_placeholders_across_clauses() {
    for dialect in DIALECTS {
        let mut q = query(dialect, "orders");
        q.inner_join(
            "customers",
            JoinOn::new()
                .on("orders.customer_id", "=", "customers.id")
                .on_value("customers.tier", ">", 1),
        )
        .unwrap()
        .where_op("orders.total", ">=", 10.5)
        .unwrap()
        .where_op("orders.created_at", ">", Expression::new("CURRENT_DATE"))
        .unwrap()
        .where_in("orders.status", vec!["paid", "shipped"])
        .unwrap()
        .where_nested(|n| {
            n.where_null("orders.deleted_at")
                .or_where_raw("orders.flag = ?", vec![Parameter::Bool(true)]);
            Ok(())
        })
        .unwrap()
        .group_by(["orders.customer_id"])
        .having_op("count(*)", ">", 2)
        .unwrap();

        let compiled = q.to_sql().unwrap();
        assert_aligned(&compiled);
        // tier, total, two statuses, flag, having
        assert_eq!(compiled.bindings().len(), 6);
    }
}

#[test]
fn question_marks_inside_literals_are_not_placeholders() {
    let mut q = query(Dialect::Postgres, "posts");
    q.where_raw("title <> 'why?' and id = ?", vec![Parameter::Int(1)]);
    let compiled = q.to_sql().unwrap();

    assert_aligned(&compiled);
    assert_eq!(
        compiled.render(PlaceholderStyle::Numbered),
        "select * from posts where title <> 'why?' and id = $1"
    );
}

#[test]
fn backslashes_follow_dialect_string_rules() {
    let mut q = query(Dialect::Postgres, "files");
    q.where_raw("path = 'C:\\' or id = ?", vec![Parameter::Int(1)]);
    let compiled = q.to_sql().unwrap();
    assert_aligned(&compiled);
    assert_eq!(
        compiled.render(PlaceholderStyle::Numbered),
        "select * from files where path = 'C:\\' or id = $1"
    );

    let mut q = query(Dialect::Sqlite, "files");
    q.where_raw("path = 'C:\\' or id = ?", vec![Parameter::Int(1)]);
    assert_aligned(&q.to_sql().unwrap());

    let mut q = query(Dialect::MySql, "notes");
    q.where_raw("body = 'it\\'s ?' and id = ?", vec![Parameter::Int(1)]);
    let compiled = q.to_sql().unwrap();
    assert_aligned(&compiled);
    assert_eq!(
        compiled.sql(),
        "select * from notes where body = 'it\\'s ?' and id = ?"
    );
}

#[test]
fn raw_expression_with_wrong_binding_count_fails() {
    let mut q = query(Dialect::Sqlite, "posts");
    q.where_raw("a = ? and b = ?", vec![Parameter::Int(1)]);
    assert!(matches!(
        q.to_sql().unwrap_err(),
        BuildError::ExpressionBindings {
            placeholders: 2,
            bindings: 1,
            ..
        }
    ));
}

#[test]
fn compile_is_deterministic() {
    for dialect in DIALECTS {
        let mut q = query(dialect, "users");
        q.select(["id"])
            .distinct()
            .where_op("age", ">", 18)
            .unwrap()
            .order_by_desc("id")
            .offset(5);
        assert_eq!(q.to_sql().unwrap(), q.to_sql().unwrap());
        assert_eq!(q.compile_count().unwrap(), q.compile_count().unwrap());
    }
}

#[test]
fn insert_tuples_match_row_count() {
    for dialect in DIALECTS {
        let q = query(dialect, "users");
        let rows: Vec<Record> = (0..4)
            .map(|i| Record::new().set("name", format!("user{i}")).set("age", i))
            .collect();

        let single = q.compile_insert(&rows[..1]).unwrap();
        assert_eq!(single.sql().matches("(?, ?)").count(), 1);

        let batch = q.compile_insert(&rows).unwrap();
        assert_eq!(batch.sql().matches("(?, ?)").count(), 4);
        assert_eq!(batch.bindings()[2], Parameter::Text("user1".into()));
        assert_eq!(batch.bindings()[3], Parameter::Int(1));
        assert_aligned(&batch);
    }
}

#[test]
fn empty_insert_is_an_error_everywhere() {
    for dialect in DIALECTS {
        let q = query(dialect, "users");
        assert_eq!(q.compile_insert(&[]).unwrap_err(), BuildError::EmptyInsert);
        assert_eq!(
            q.compile_upsert(&[], &["id"], &["name"]).unwrap_err(),
            BuildError::EmptyInsert
        );
    }
}

#[test]
fn empty_record_inserts_defaults() {
    let record = [Record::new()];
    assert_eq!(
        query(Dialect::Postgres, "logs").compile_insert(&record).unwrap().sql(),
        "insert into logs default values"
    );
    assert_eq!(
        query(Dialect::MySql, "logs").compile_insert(&record).unwrap().sql(),
        "insert into logs () values ()"
    );
}

#[test]
fn upsert_per_dialect() {
    let rows = [Record::new().set("email", "a@b.c").set("name", "A")];

    let pg = query(Dialect::Postgres, "users")
        .compile_upsert(&rows, &["email"], &["name"])
        .unwrap();
    assert_eq!(
        pg.sql(),
        "insert into users (email, name) values (?, ?) on conflict (email) do update set name = excluded.name"
    );
    assert_eq!(pg.kind(), StatementKind::Upsert);

    let mysql = query(Dialect::MySql, "users")
        .compile_upsert(&rows, &["email"], &["name"])
        .unwrap();
    assert_eq!(
        mysql.sql(),
        "insert into users (email, name) values (?, ?) on duplicate key update name = values(name)"
    );

    let ignore = query(Dialect::Sqlite, "users")
        .compile_upsert(&rows, &["email"], &[])
        .unwrap();
    assert!(ignore.sql().ends_with("on conflict (email) do nothing"));
}

#[test]
fn upsert_requires_conflict_columns() {
    let rows = [Record::new().set("email", "a@b.c")];
    let err = query(Dialect::Postgres, "users")
        .compile_upsert(&rows, &[], &["email"])
        .unwrap_err();
    assert!(matches!(err, BuildError::MissingInput(_)));
}

#[test]
fn insert_get_id_returning_depends_on_dialect() {
    let row = Record::new().set("name", "A");
    let options = quarry_core::InsertGetIdOptions::default();

    let pg = query(Dialect::Postgres, "users")
        .compile_insert_get_id(&row, &options)
        .unwrap();
    assert_eq!(pg.sql(), "insert into users (name) values (?) returning id");
    assert!(pg.returns_rows());

    let mysql = query(Dialect::MySql, "users")
        .compile_insert_get_id(&row, &options)
        .unwrap();
    assert_eq!(mysql.sql(), "insert into users (name) values (?)");
    assert_eq!(mysql.kind(), StatementKind::InsertGetId);
    assert!(!mysql.returns_rows());
}

#[test]
fn paginated_count_uses_subquery() {
    let mut q = query(Dialect::Sqlite, "users");
    q.where_op("active", "=", true).unwrap().for_page(2, 10);
    assert_eq!(
        q.compile_count().unwrap().sql(),
        "select count(*) as count from (select * from users where active = ? limit 10 offset 10) as count_subquery"
    );
}

#[test]
fn dialect_specific_operators() {
    let mut pg = query(Dialect::Postgres, "users");
    assert!(pg.where_op("name", "similar to", "%a%").is_ok());
    assert!(pg.where_op("name", "glob", "a*").is_err());

    let mut sqlite = query(Dialect::Sqlite, "users");
    assert!(sqlite.where_op("name", "glob", "a*").is_ok());
    assert!(sqlite.where_op("name", "regexp", "^a").is_err());

    let mut mysql = query(Dialect::MySql, "users");
    assert!(mysql.where_op("name", "REGEXP", "^a").is_ok());
    assert!(mysql.where_op("name", "<=>", Parameter::Null).is_ok());
}
