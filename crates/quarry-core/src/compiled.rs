//! Compiled statements.
//!
//! A [`CompiledSql`] keeps the statement as the list of text segments between
//! placeholders. The `?` form and the `$n` form are both renderings of the same
//! segments, so renumbering can never touch a `?` that lives inside a literal.

use std::fmt::Write as _;

use tracing::warn;

use crate::error::{BuildError, Result};
use crate::expression::Expression;
use crate::lexer::StringEscapes;
use crate::value::Parameter;

/// What kind of statement was compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// `select ...`
    Select,
    /// `select count(*) ...`
    Count,
    /// `insert ...`
    Insert,
    /// `insert ...` that should report generated keys.
    InsertGetId,
    /// `update ...`
    Update,
    /// `insert ... on conflict ...`
    Upsert,
    /// `delete ...`
    Delete,
    /// DDL.
    Schema,
    /// Caller-supplied SQL.
    Raw,
}

/// How positional placeholders are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`
    QuestionMark,
    /// `$1`, `$2`, ...
    Numbered,
}

/// A compiled statement: SQL text plus ordered bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSql {
    sql: String,
    parts: Vec<String>,
    bindings: Vec<Parameter>,
    kind: StatementKind,
    returning: Vec<String>,
}

impl CompiledSql {
    /// Wraps SQL text that has no bindings.
    #[must_use]
    pub fn raw(sql: impl Into<String>, kind: StatementKind) -> Self {
        let sql = sql.into();
        Self {
            parts: vec![sql.clone()],
            sql,
            bindings: Vec::new(),
            kind,
            returning: Vec::new(),
        }
    }

    /// Returns the SQL with `?` placeholders.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the text segments between placeholders.
    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Returns the bindings in placeholder order.
    #[must_use]
    pub fn bindings(&self) -> &[Parameter] {
        &self.bindings
    }

    /// Returns the statement kind.
    #[must_use]
    pub const fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Returns the columns requested through a RETURNING clause.
    #[must_use]
    pub fn returning(&self) -> &[String] {
        &self.returning
    }

    /// Returns the number of placeholders emitted.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.parts.len().saturating_sub(1)
    }

    /// Returns true if executing the statement yields rows.
    #[must_use]
    pub fn returns_rows(&self) -> bool {
        matches!(self.kind, StatementKind::Select | StatementKind::Count)
            || !self.returning.is_empty()
    }

    /// Renders the SQL with the given placeholder style.
    #[must_use]
    pub fn render(&self, style: PlaceholderStyle) -> String {
        match style {
            PlaceholderStyle::QuestionMark => self.sql.clone(),
            PlaceholderStyle::Numbered => {
                let mut sql = String::with_capacity(self.sql.len() + self.parts.len() * 2);
                for (index, part) in self.parts.iter().enumerate() {
                    if index > 0 {
                        let _ = write!(sql, "${index}");
                    }
                    sql.push_str(part);
                }
                sql
            }
        }
    }

    /// Returns a copy with a different statement kind.
    #[must_use]
    pub fn with_kind(mut self, kind: StatementKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Incrementally writes SQL text and bindings, keeping them aligned.
#[derive(Debug, Clone)]
pub struct SqlWriter {
    parts: Vec<String>,
    bindings: Vec<Parameter>,
    escapes: StringEscapes,
}

impl Default for SqlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlWriter {
    /// Creates an empty writer that splices expressions with standard string
    /// escapes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_escapes(StringEscapes::Standard)
    }

    /// Creates an empty writer that tokenizes spliced expressions with the
    /// given string escapes.
    #[must_use]
    pub fn with_escapes(escapes: StringEscapes) -> Self {
        Self {
            parts: vec![String::new()],
            bindings: Vec::new(),
            escapes,
        }
    }

    /// Appends SQL text.
    pub fn push(&mut self, text: &str) -> &mut Self {
        if let Some(last) = self.parts.last_mut() {
            last.push_str(text);
        }
        self
    }

    /// Appends a value: a placeholder for scalars and arrays, the spliced
    /// fragment for expressions.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ExpressionBindings`] if an expression's
    /// placeholders and bindings disagree.
    pub fn bind(&mut self, value: &Parameter) -> Result<&mut Self> {
        match value {
            Parameter::Expression(expr) => self.splice(expr),
            other => Ok(self.push_binding(other.clone())),
        }
    }

    /// Appends a placeholder bound to a text value.
    pub fn bind_text(&mut self, value: &str) -> &mut Self {
        self.push_binding(Parameter::Text(value.to_string()))
    }

    fn push_binding(&mut self, value: Parameter) -> &mut Self {
        self.bindings.push(value);
        self.parts.push(String::new());
        self
    }

    /// Appends `(?, ?, ...)` for each element of a list.
    ///
    /// # Errors
    ///
    /// See [`SqlWriter::bind`].
    pub fn bind_list(&mut self, values: &[Parameter]) -> Result<&mut Self> {
        self.push("(");
        for (index, value) in values.iter().enumerate() {
            if index > 0 {
                self.push(", ");
            }
            self.bind(value)?;
        }
        self.push(")");
        Ok(self)
    }

    /// Splices a raw expression and its bindings.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ExpressionBindings`] if the tokenized placeholder
    /// count differs from the number of bindings.
    pub fn splice(&mut self, expr: &Expression) -> Result<&mut Self> {
        match expr.tokenize_with(self.escapes) {
            Ok(parts) => {
                let placeholders = parts.len().saturating_sub(1);
                if placeholders != expr.bindings().len() {
                    return Err(BuildError::ExpressionBindings {
                        sql: expr.sql().to_string(),
                        placeholders,
                        bindings: expr.bindings().len(),
                    });
                }
                for (index, part) in parts.iter().enumerate() {
                    if index > 0 {
                        self.bind(&expr.bindings()[index - 1])?;
                    }
                    self.push(part);
                }
            }
            Err(err) => {
                warn!(sql = %expr.sql(), error = %err, "Splicing expression as opaque SQL");
                self.push(expr.sql());
                self.bindings.extend(expr.bindings().iter().cloned());
            }
        }
        Ok(self)
    }

    /// Returns true if nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.parts.iter().all(String::is_empty)
    }

    /// Finishes the statement.
    #[must_use]
    pub fn finish(self, kind: StatementKind) -> CompiledSql {
        CompiledSql {
            sql: self.parts.join("?"),
            parts: self.parts,
            bindings: self.bindings,
            kind,
            returning: Vec::new(),
        }
    }

    /// Finishes a statement that carries a RETURNING clause.
    #[must_use]
    pub fn finish_returning(self, kind: StatementKind, returning: Vec<String>) -> CompiledSql {
        let mut compiled = self.finish(kind);
        compiled.returning = returning;
        compiled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_keeps_parts_aligned() {
        let mut writer = SqlWriter::new();
        writer.push("select * from t where a = ");
        writer.bind(&Parameter::Int(1)).unwrap();
        writer.push(" and b in ");
        writer
            .bind_list(&[Parameter::Text("x".into()), Parameter::Text("y".into())])
            .unwrap();
        let compiled = writer.finish(StatementKind::Select);

        assert_eq!(
            compiled.sql(),
            "select * from t where a = ? and b in (?, ?)"
        );
        assert_eq!(compiled.placeholder_count(), 3);
        assert_eq!(compiled.bindings().len(), 3);
    }

    #[test]
    fn test_numbered_rendering() {
        let mut writer = SqlWriter::new();
        writer.push("update t set a = ");
        writer.bind(&Parameter::Int(1)).unwrap();
        writer.push(", note = 'what?' where id = ");
        writer.bind(&Parameter::Int(2)).unwrap();
        let compiled = writer.finish(StatementKind::Update);

        assert_eq!(
            compiled.render(PlaceholderStyle::Numbered),
            "update t set a = $1, note = 'what?' where id = $2"
        );
        assert_eq!(compiled.render(PlaceholderStyle::QuestionMark), compiled.sql());
    }

    #[test]
    fn test_expression_is_spliced_not_bound() {
        let mut writer = SqlWriter::new();
        writer.push("views = ");
        writer
            .bind(&Parameter::Expression(Expression::with_bindings(
                "views + ?",
                vec![Parameter::Int(1)],
            )))
            .unwrap();
        let compiled = writer.finish(StatementKind::Update);

        assert_eq!(compiled.sql(), "views = views + ?");
        assert_eq!(compiled.bindings(), &[Parameter::Int(1)]);
        assert!(!compiled.bindings().iter().any(Parameter::is_expression));
    }

    #[test]
    fn test_expression_binding_mismatch() {
        let mut writer = SqlWriter::new();
        let err = writer
            .splice(&Expression::new("a = ? and b = ?"))
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::ExpressionBindings {
                placeholders: 2,
                bindings: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_returns_rows() {
        assert!(CompiledSql::raw("select 1", StatementKind::Select).returns_rows());
        assert!(!CompiledSql::raw("delete from t", StatementKind::Delete).returns_rows());
        let writer = SqlWriter::new();
        let compiled =
            writer.finish_returning(StatementKind::InsertGetId, vec!["id".to_string()]);
        assert!(compiled.returns_rows());
    }

    #[test]
    fn test_splice_follows_writer_escapes() {
        let expr = Expression::with_bindings("path = 'C:\\' or id = ?", vec![Parameter::Int(7)]);

        let mut writer = SqlWriter::new();
        writer.push("select * from files where ");
        writer.splice(&expr).unwrap();
        let compiled = writer.finish(StatementKind::Select);
        assert_eq!(
            compiled.render(PlaceholderStyle::Numbered),
            "select * from files where path = 'C:\\' or id = $1"
        );

        let expr = Expression::with_bindings("name = 'it\\'s' or id = ?", vec![Parameter::Int(7)]);
        let mut writer = SqlWriter::with_escapes(StringEscapes::Backslash);
        writer.splice(&expr).unwrap();
        assert_eq!(writer.finish(StatementKind::Select).placeholder_count(), 1);
    }
}
