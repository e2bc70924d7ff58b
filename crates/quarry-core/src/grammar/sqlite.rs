//! SQLite query grammar.

use super::{Dialect, QueryGrammar};

/// Operators accepted by SQLite.
const OPERATORS: &[&str] = &[
    "=", "!=", "<>", ">", ">=", "<", "<=", "like", "not like", "ilike", "in", "not in", "glob",
];

/// SQLite query grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGrammar;

impl SqliteGrammar {
    /// Creates a new SQLite grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl QueryGrammar for SqliteGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn operators(&self) -> &'static [&'static str] {
        OPERATORS
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn render_operator<'a>(&self, operator: &'a str) -> &'a str {
        // ASCII `like` is case-insensitive in SQLite.
        if operator == "ilike" { "like" } else { operator }
    }

    fn limit_for_offset_only(&self) -> Option<&'static str> {
        Some("-1")
    }
}
