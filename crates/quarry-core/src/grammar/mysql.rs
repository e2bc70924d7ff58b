//! MySQL query grammar.

use super::compile;
use super::{Dialect, QueryGrammar};
use crate::compiled::{CompiledSql, StatementKind};
use crate::error::{BuildError, Result};
use crate::query::parts::JoinType;
use crate::value::Record;

/// Operators accepted by MySQL.
const OPERATORS: &[&str] = &[
    "=", "!=", "<>", ">", ">=", "<", "<=", "like", "not like", "ilike", "in", "not in",
    "regexp", "<=>",
];

/// MySQL query grammar.
///
/// There is no RETURNING: generated keys come from the connection's
/// `LAST_INSERT_ID()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlGrammar;

impl MySqlGrammar {
    /// Creates a new MySQL grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl QueryGrammar for MySqlGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn operators(&self) -> &'static [&'static str] {
        OPERATORS
    }

    fn supports_join(&self, join_type: JoinType) -> bool {
        join_type != JoinType::Full
    }

    fn render_operator<'a>(&self, operator: &'a str) -> &'a str {
        // `like` already ignores case under the default collations.
        if operator == "ilike" { "like" } else { operator }
    }

    fn limit_for_offset_only(&self) -> Option<&'static str> {
        Some("18446744073709551615")
    }

    fn compile_empty_insert(&self, table: &str) -> String {
        format!("insert into {table} () values ()")
    }

    fn compile_upsert(
        &self,
        table: &str,
        rows: &[Record],
        conflict: &[String],
        update: &[String],
    ) -> Result<CompiledSql> {
        // MySQL resolves conflicts against every unique key; the conflict
        // columns only document intent.
        if conflict.is_empty() {
            return Err(BuildError::MissingInput(
                "upsert needs at least one conflict column".to_string(),
            ));
        }

        let mut writer = compile::writer_for(self);
        if update.is_empty() {
            compile::write_insert(self, "insert ignore into", table, rows, &mut writer)?;
        } else {
            compile::write_insert(self, "insert into", table, rows, &mut writer)?;
            let assignments: Vec<String> = update
                .iter()
                .map(|column| format!("{column} = values({column})"))
                .collect();
            writer
                .push(" on duplicate key update ")
                .push(&assignments.join(", "));
        }

        Ok(writer.finish(StatementKind::Upsert))
    }
}
