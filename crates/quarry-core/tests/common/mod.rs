#![allow(dead_code)]

use quarry_core::{CompiledSql, Dialect, Query};

pub const DIALECTS: [Dialect; 3] = [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite];

/// Returns a query on `table` for `dialect`.
pub fn query(dialect: Dialect, table: &str) -> Query {
    let mut query = Query::new(dialect.query_grammar());
    query.table(table);
    query
}

/// Counts `?` placeholders the way a driver would see them.
pub fn placeholders(compiled: &CompiledSql) -> usize {
    compiled.placeholder_count()
}

/// Asserts that placeholders and bindings line up.
pub fn assert_aligned(compiled: &CompiledSql) {
    assert_eq!(
        placeholders(compiled),
        compiled.bindings().len(),
        "placeholder/binding mismatch in: {}",
        compiled.sql()
    );
}
