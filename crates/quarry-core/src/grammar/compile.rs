//! Shared compilation helpers used by every dialect.

use super::QueryGrammar;
use crate::compiled::{CompiledSql, SqlWriter, StatementKind};
use crate::error::{BuildError, Result};
use crate::query::parts::{
    HavingClause, HavingPredicate, JoinClause, Predicate, QueryParts, WhereClause,
};
use crate::value::{Parameter, Record};

/// Starts a statement that splices expressions with the grammar's string
/// escapes.
pub fn writer_for<G: QueryGrammar + ?Sized>(grammar: &G) -> SqlWriter {
    SqlWriter::with_escapes(grammar.dialect().string_escapes())
}

/// Returns the table or [`BuildError::MissingTable`].
pub fn require_table(parts: &QueryParts) -> Result<&str> {
    parts.table.as_deref().ok_or(BuildError::MissingTable)
}

/// Writes a full select statement.
pub fn write_select<G: QueryGrammar + ?Sized>(
    grammar: &G,
    parts: &QueryParts,
    writer: &mut SqlWriter,
) -> Result<()> {
    let table = require_table(parts)?;

    writer.push("select ");
    if parts.distinct {
        writer.push("distinct ");
    }
    if parts.select.is_empty() {
        writer.push("*");
    } else {
        writer.push(&parts.select.join(", "));
    }
    writer.push(" from ").push(table);

    write_joins(grammar, &parts.joins, writer)?;
    write_where(grammar, &parts.wheres, writer)?;

    if !parts.group_by.is_empty() {
        writer.push(" group by ").push(&parts.group_by.join(", "));
    }

    write_having(grammar, &parts.having, writer)?;

    if !parts.order_by.is_empty() {
        writer.push(" order by ").push(&parts.order_by.join(", "));
    }

    match (parts.limit, parts.offset) {
        (Some(limit), _) => {
            writer.push(&format!(" limit {limit}"));
        }
        (None, Some(_)) => {
            if let Some(limit) = grammar.limit_for_offset_only() {
                writer.push(" limit ").push(limit);
            }
        }
        (None, None) => {}
    }
    if let Some(offset) = parts.offset {
        writer.push(&format!(" offset {offset}"));
    }

    Ok(())
}

/// Compiles a count. Grouped, distinct or paginated queries are counted
/// through a subquery so the count matches what `get` would return.
pub fn count<G: QueryGrammar + ?Sized>(grammar: &G, parts: &QueryParts) -> Result<CompiledSql> {
    let table = require_table(parts)?;
    let mut writer = writer_for(grammar);

    let wrap = parts.distinct
        || !parts.group_by.is_empty()
        || parts.limit.is_some()
        || parts.offset.is_some();

    if wrap {
        writer.push("select count(*) as count from (");
        write_select(grammar, parts, &mut writer)?;
        writer.push(") as count_subquery");
    } else {
        writer.push("select count(*) as count from ").push(table);
        write_joins(grammar, &parts.joins, &mut writer)?;
        write_where(grammar, &parts.wheres, &mut writer)?;
        write_having(grammar, &parts.having, &mut writer)?;
    }

    Ok(writer.finish(StatementKind::Count))
}

/// Writes ` <join> <table> on ...` for each join.
pub fn write_joins<G: QueryGrammar + ?Sized>(
    grammar: &G,
    joins: &[JoinClause],
    writer: &mut SqlWriter,
) -> Result<()> {
    for join in joins {
        writer
            .push(" ")
            .push(join.join_type.as_sql())
            .push(" ")
            .push(&join.table);
        if !join.conditions.is_empty() {
            writer.push(" on ");
            write_clauses(grammar, &join.conditions, writer)?;
        }
    }
    Ok(())
}

/// Writes ` where ...` if there are clauses.
pub fn write_where<G: QueryGrammar + ?Sized>(
    grammar: &G,
    clauses: &[WhereClause],
    writer: &mut SqlWriter,
) -> Result<()> {
    if clauses.is_empty() {
        return Ok(());
    }
    writer.push(" where ");
    write_clauses(grammar, clauses, writer)
}

/// Writes a clause list in order. The first clause never gets a connective.
pub fn write_clauses<G: QueryGrammar + ?Sized>(
    grammar: &G,
    clauses: &[WhereClause],
    writer: &mut SqlWriter,
) -> Result<()> {
    for (index, clause) in clauses.iter().enumerate() {
        if index > 0 {
            writer.push(" ").push(clause.conjunction.as_sql()).push(" ");
        }
        if clause.negate {
            writer.push("not ");
        }
        write_predicate(grammar, &clause.predicate, writer)?;
    }
    Ok(())
}

fn write_predicate<G: QueryGrammar + ?Sized>(
    grammar: &G,
    predicate: &Predicate,
    writer: &mut SqlWriter,
) -> Result<()> {
    match predicate {
        Predicate::Operation {
            column,
            operator,
            value,
        } => write_comparison(grammar, column, operator, value, writer),
        Predicate::OperationColumn {
            first,
            operator,
            second,
        } => {
            writer
                .push(first)
                .push(" ")
                .push(grammar.render_operator(operator))
                .push(" ")
                .push(second);
            Ok(())
        }
        Predicate::Null { column } => {
            writer.push(column).push(" is null");
            Ok(())
        }
        Predicate::Nested(clauses) => {
            writer.push("(");
            write_clauses(grammar, clauses, writer)?;
            writer.push(")");
            Ok(())
        }
        Predicate::Raw(expr) => writer.splice(expr).map(|_| ()),
    }
}

/// Writes `column <op> value`, expanding list operands of `in`/`not in`.
pub fn write_comparison<G: QueryGrammar + ?Sized>(
    grammar: &G,
    column: &str,
    operator: &str,
    value: &Parameter,
    writer: &mut SqlWriter,
) -> Result<()> {
    let is_list_operator = matches!(operator, "in" | "not in");

    if is_list_operator {
        if let Parameter::Array(values) = value {
            if values.is_empty() {
                // Nothing is in an empty list.
                writer.push(if operator == "in" { "1 = 0" } else { "1 = 1" });
                return Ok(());
            }
        }
    }

    writer
        .push(column)
        .push(" ")
        .push(grammar.render_operator(operator))
        .push(" ");

    match value {
        Parameter::Array(values) if is_list_operator => {
            writer.bind_list(values)?;
        }
        Parameter::Expression(expr) if is_list_operator => {
            writer.push("(");
            writer.splice(expr)?;
            writer.push(")");
        }
        other => {
            writer.bind(other)?;
        }
    }
    Ok(())
}

/// Writes ` having ...` if there are clauses.
pub fn write_having<G: QueryGrammar + ?Sized>(
    grammar: &G,
    clauses: &[HavingClause],
    writer: &mut SqlWriter,
) -> Result<()> {
    if clauses.is_empty() {
        return Ok(());
    }
    writer.push(" having ");
    for (index, clause) in clauses.iter().enumerate() {
        if index > 0 {
            writer.push(" ").push(clause.conjunction.as_sql()).push(" ");
        }
        if clause.negate {
            writer.push("not ");
        }
        match &clause.predicate {
            HavingPredicate::Operation {
                column,
                operator,
                value,
            } => write_comparison(grammar, column, operator, value, writer)?,
            HavingPredicate::Raw(expr) => {
                writer.splice(expr)?;
            }
        }
    }
    Ok(())
}

/// Writes `<verb> table (cols) values (...), (...)`.
///
/// Bindings are appended row by row, column by column.
pub fn write_insert<G: QueryGrammar + ?Sized>(
    grammar: &G,
    verb: &str,
    table: &str,
    rows: &[Record],
    writer: &mut SqlWriter,
) -> Result<()> {
    let first = rows.first().ok_or(BuildError::EmptyInsert)?;

    if first.is_empty() {
        if rows.len() > 1 {
            return Err(BuildError::MissingInput(
                "batch insert rows need at least one column".to_string(),
            ));
        }
        writer.push(&grammar.compile_empty_insert(table));
        return Ok(());
    }

    let columns: Vec<&str> = first.columns().collect();
    writer
        .push(verb)
        .push(" ")
        .push(table)
        .push(" (")
        .push(&columns.join(", "))
        .push(") values ");

    for (row_index, row) in rows.iter().enumerate() {
        if let Some(extra) = row.columns().find(|column| !columns.contains(column)) {
            return Err(BuildError::MismatchedRow {
                row: row_index,
                column: extra.to_string(),
            });
        }
        if row_index > 0 {
            writer.push(", ");
        }
        writer.push("(");
        for (column_index, column) in columns.iter().enumerate() {
            let value = row.get(column).ok_or_else(|| BuildError::MismatchedRow {
                row: row_index,
                column: (*column).to_string(),
            })?;
            if column_index > 0 {
                writer.push(", ");
            }
            writer.bind(value)?;
        }
        writer.push(")");
    }

    Ok(())
}

/// Compiles an insert followed by `returning <keys>` when the dialect has it.
pub fn insert_returning<G: QueryGrammar + ?Sized>(
    grammar: &G,
    table: &str,
    row: &Record,
    primary_keys: &[String],
) -> Result<CompiledSql> {
    let mut writer = writer_for(grammar);
    write_insert(grammar, "insert into", table, std::slice::from_ref(row), &mut writer)?;

    if !grammar.supports_returning() {
        return Ok(writer.finish(StatementKind::InsertGetId));
    }
    if primary_keys.is_empty() {
        return Err(BuildError::MissingInput(
            "insert_get_id needs at least one primary key column".to_string(),
        ));
    }
    writer.push(" returning ").push(&primary_keys.join(", "));
    Ok(writer.finish_returning(StatementKind::InsertGetId, primary_keys.to_vec()))
}

/// Compiles `update table set ... [where ...]`.
pub fn update<G: QueryGrammar + ?Sized>(
    grammar: &G,
    parts: &QueryParts,
    values: &Record,
) -> Result<CompiledSql> {
    let table = require_table(parts)?;
    if values.is_empty() {
        return Err(BuildError::EmptyUpdate);
    }

    let mut writer = writer_for(grammar);
    writer.push("update ").push(table).push(" set ");
    for (index, (column, value)) in values.iter().enumerate() {
        if index > 0 {
            writer.push(", ");
        }
        writer.push(column).push(" = ");
        writer.bind(value)?;
    }
    write_where(grammar, &parts.wheres, &mut writer)?;

    Ok(writer.finish(StatementKind::Update))
}

/// Compiles `delete from table [where ...]`.
pub fn delete<G: QueryGrammar + ?Sized>(grammar: &G, parts: &QueryParts) -> Result<CompiledSql> {
    let table = require_table(parts)?;
    let mut writer = writer_for(grammar);
    writer.push("delete from ").push(table);
    write_where(grammar, &parts.wheres, &mut writer)?;
    Ok(writer.finish(StatementKind::Delete))
}

/// Compiles `insert ... on conflict (...) do update set ... | do nothing`.
pub fn upsert_on_conflict<G: QueryGrammar + ?Sized>(
    grammar: &G,
    table: &str,
    rows: &[Record],
    conflict: &[String],
    update: &[String],
) -> Result<CompiledSql> {
    if conflict.is_empty() {
        return Err(BuildError::MissingInput(
            "upsert needs at least one conflict column".to_string(),
        ));
    }

    let mut writer = writer_for(grammar);
    write_insert(grammar, "insert into", table, rows, &mut writer)?;
    writer
        .push(" on conflict (")
        .push(&conflict.join(", "))
        .push(")");

    if update.is_empty() {
        writer.push(" do nothing");
    } else {
        let assignments: Vec<String> = update
            .iter()
            .map(|column| format!("{column} = excluded.{column}"))
            .collect();
        writer.push(" do update set ").push(&assignments.join(", "));
    }

    Ok(writer.finish(StatementKind::Upsert))
}
