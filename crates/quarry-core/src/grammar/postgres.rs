//! PostgreSQL query grammar.

use super::{Dialect, QueryGrammar};

/// Operators accepted by PostgreSQL.
const OPERATORS: &[&str] = &[
    "=", "!=", "<>", ">", ">=", "<", "<=", "like", "not like", "ilike", "not ilike", "in",
    "not in", "similar to",
];

/// PostgreSQL query grammar.
///
/// Statements are compiled with `?` placeholders like every other dialect; the
/// connection renders them as `$n` when it executes them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGrammar;

impl PostgresGrammar {
    /// Creates a new PostgreSQL grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl QueryGrammar for PostgresGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn operators(&self) -> &'static [&'static str] {
        OPERATORS
    }

    fn supports_returning(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parts::QueryParts;
    use crate::value::Record;

    fn parts(table: &str) -> QueryParts {
        QueryParts {
            table: Some(table.to_string()),
            ..QueryParts::default()
        }
    }

    #[test]
    fn test_insert_get_id_appends_returning() {
        let grammar = PostgresGrammar::new();
        let row = Record::new().set("name", "Ada");
        let compiled = grammar
            .compile_insert_get_id("users", &row, &["id".to_string()])
            .unwrap();

        assert_eq!(
            compiled.sql(),
            "insert into users (name) values (?) returning id"
        );
        assert_eq!(compiled.returning(), &["id".to_string()]);
        assert!(compiled.returns_rows());
    }

    #[test]
    fn test_offset_without_limit() {
        let grammar = PostgresGrammar::new();
        let mut parts = parts("users");
        parts.offset = Some(5);
        let compiled = grammar.compile_select(&parts).unwrap();
        assert_eq!(compiled.sql(), "select * from users offset 5");
    }

    #[test]
    fn test_upsert_on_conflict() {
        let grammar = PostgresGrammar::new();
        let rows = vec![Record::new().set("email", "a@x").set("name", "A")];
        let compiled = grammar
            .compile_upsert(
                "users",
                &rows,
                &["email".to_string()],
                &["name".to_string()],
            )
            .unwrap();
        assert_eq!(
            compiled.sql(),
            "insert into users (email, name) values (?, ?) on conflict (email) do update set name = excluded.name"
        );
    }

    #[test]
    fn test_ilike_is_allowed() {
        let grammar = PostgresGrammar::new();
        assert_eq!(grammar.validate_operator("ILIKE").unwrap(), "ilike");
        assert_eq!(grammar.validate_operator("not   in").unwrap(), "not in");
        assert!(grammar.validate_operator("glob").is_err());
    }
}
