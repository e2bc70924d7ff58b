//! The fluent query builder.
//!
//! A [`Query`] owns its [`QueryParts`] and the grammar it compiles with.
//! Builder methods validate their input immediately, so a bad operator fails
//! at the call site instead of when the statement is compiled.
//!
//! ```rust
//! use quarry_core::{Dialect, Query};
//!
//! let mut query = Query::new(Dialect::Postgres.query_grammar());
//! query
//!     .table("users")
//!     .where_op("region_id", "=", 2)?
//!     .or_where_not_op("country_id", "=", "BE")?;
//!
//! let compiled = query.to_sql()?;
//! assert_eq!(
//!     compiled.sql(),
//!     "select * from users where region_id = ? or not country_id = ?"
//! );
//! # Ok::<(), quarry_core::BuildError>(())
//! ```

mod join;
pub mod parts;

use std::fmt;
use std::sync::Arc;

pub use join::JoinOn;
pub use parts::{
    Conjunction, Direction, HavingClause, HavingPredicate, JoinClause, JoinType, Predicate,
    QueryParts, WhereClause,
};

use crate::compiled::CompiledSql;
use crate::error::{BuildError, Result};
use crate::expression::Expression;
use crate::grammar::QueryGrammar;
use crate::value::{Parameter, Record, ToParameter};

/// Options for [`Query::compile_insert_get_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertGetIdOptions {
    /// Primary-key columns to report back.
    pub primary_keys: Vec<String>,
}

impl Default for InsertGetIdOptions {
    fn default() -> Self {
        Self {
            primary_keys: vec!["id".to_string()],
        }
    }
}

impl InsertGetIdOptions {
    /// Requests the given key columns.
    #[must_use]
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            primary_keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

/// A query under construction.
#[derive(Clone)]
pub struct Query {
    grammar: Arc<dyn QueryGrammar>,
    parts: QueryParts,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("dialect", &self.grammar.dialect())
            .field("parts", &self.parts)
            .finish()
    }
}

impl Query {
    /// Creates an empty query compiled by `grammar`.
    #[must_use]
    pub fn new(grammar: Arc<dyn QueryGrammar>) -> Self {
        Self {
            grammar,
            parts: QueryParts::default(),
        }
    }

    /// Returns the grammar.
    #[must_use]
    pub fn grammar(&self) -> &dyn QueryGrammar {
        self.grammar.as_ref()
    }

    /// Returns the accumulated parts.
    #[must_use]
    pub const fn parts(&self) -> &QueryParts {
        &self.parts
    }

    /// Returns a fresh query sharing this query's grammar.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self::new(Arc::clone(&self.grammar))
    }

    /// Sets the table.
    pub fn table(&mut self, table: impl Into<String>) -> &mut Self {
        self.parts.table = Some(table.into());
        self
    }

    /// Adds columns to the select list.
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parts
            .select
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Selects distinct rows.
    pub fn distinct(&mut self) -> &mut Self {
        self.parts.distinct = true;
        self
    }

    // ------------------------------------------------------------------
    // where
    // ------------------------------------------------------------------

    /// Adds `and column <op> value`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnsupportedOperator`] if the grammar rejects the
    /// operator.
    pub fn where_op(
        &mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl ToParameter,
    ) -> Result<&mut Self> {
        self.where_op_with(column, operator, value, Conjunction::And, false)
    }

    /// Adds `or column <op> value`.
    ///
    /// # Errors
    ///
    /// See [`Query::where_op`].
    pub fn or_where_op(
        &mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl ToParameter,
    ) -> Result<&mut Self> {
        self.where_op_with(column, operator, value, Conjunction::Or, false)
    }

    /// Adds `and not column <op> value`.
    ///
    /// # Errors
    ///
    /// See [`Query::where_op`].
    pub fn where_not_op(
        &mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl ToParameter,
    ) -> Result<&mut Self> {
        self.where_op_with(column, operator, value, Conjunction::And, true)
    }

    /// Adds `or not column <op> value`.
    ///
    /// # Errors
    ///
    /// See [`Query::where_op`].
    pub fn or_where_not_op(
        &mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl ToParameter,
    ) -> Result<&mut Self> {
        self.where_op_with(column, operator, value, Conjunction::Or, true)
    }

    /// Adds a comparison with an explicit connective and negation.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnsupportedOperator`] for a disallowed operator
    /// and [`BuildError::InvalidOperand`] for `in`/`not in` with a scalar.
    pub fn where_op_with(
        &mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl ToParameter,
        conjunction: Conjunction,
        negate: bool,
    ) -> Result<&mut Self> {
        let value = value.to_parameter();
        let operator = self.checked_operator(operator, &value)?;
        self.parts.wheres.push(WhereClause {
            predicate: Predicate::Operation {
                column: column.into(),
                operator,
                value,
            },
            conjunction,
            negate,
        });
        Ok(self)
    }

    /// Adds `and column in (...)`.
    ///
    /// # Errors
    ///
    /// See [`Query::where_op`].
    pub fn where_in<T: ToParameter>(
        &mut self,
        column: impl Into<String>,
        values: Vec<T>,
    ) -> Result<&mut Self> {
        self.where_op_with(column, "in", values, Conjunction::And, false)
    }

    /// Adds `and column not in (...)`.
    ///
    /// # Errors
    ///
    /// See [`Query::where_op`].
    pub fn where_not_in<T: ToParameter>(
        &mut self,
        column: impl Into<String>,
        values: Vec<T>,
    ) -> Result<&mut Self> {
        self.where_op_with(column, "not in", values, Conjunction::And, false)
    }

    /// Adds `and first <op> second` comparing two columns.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnsupportedOperator`] for a disallowed operator.
    pub fn where_column(
        &mut self,
        first: impl Into<String>,
        operator: &str,
        second: impl Into<String>,
    ) -> Result<&mut Self> {
        self.where_column_with(first, operator, second, Conjunction::And, false)
    }

    /// Adds `or first <op> second` comparing two columns.
    ///
    /// # Errors
    ///
    /// See [`Query::where_column`].
    pub fn or_where_column(
        &mut self,
        first: impl Into<String>,
        operator: &str,
        second: impl Into<String>,
    ) -> Result<&mut Self> {
        self.where_column_with(first, operator, second, Conjunction::Or, false)
    }

    /// Adds a column comparison with an explicit connective and negation.
    ///
    /// # Errors
    ///
    /// See [`Query::where_column`].
    pub fn where_column_with(
        &mut self,
        first: impl Into<String>,
        operator: &str,
        second: impl Into<String>,
        conjunction: Conjunction,
        negate: bool,
    ) -> Result<&mut Self> {
        let operator = self.grammar.validate_operator(operator)?;
        self.parts.wheres.push(WhereClause {
            predicate: Predicate::OperationColumn {
                first: first.into(),
                operator,
                second: second.into(),
            },
            conjunction,
            negate,
        });
        Ok(self)
    }

    /// Adds `and column is null`.
    pub fn where_null(&mut self, column: impl Into<String>) -> &mut Self {
        self.where_null_with(column, Conjunction::And, false)
    }

    /// Adds `or column is null`.
    pub fn or_where_null(&mut self, column: impl Into<String>) -> &mut Self {
        self.where_null_with(column, Conjunction::Or, false)
    }

    /// Adds `and not column is null`.
    pub fn where_not_null(&mut self, column: impl Into<String>) -> &mut Self {
        self.where_null_with(column, Conjunction::And, true)
    }

    /// Adds `or not column is null`.
    pub fn or_where_not_null(&mut self, column: impl Into<String>) -> &mut Self {
        self.where_null_with(column, Conjunction::Or, true)
    }

    /// Adds a null test with an explicit connective and negation.
    pub fn where_null_with(
        &mut self,
        column: impl Into<String>,
        conjunction: Conjunction,
        negate: bool,
    ) -> &mut Self {
        self.parts.wheres.push(WhereClause {
            predicate: Predicate::Null {
                column: column.into(),
            },
            conjunction,
            negate,
        });
        self
    }

    /// Adds `and <sql>` with its own bindings.
    pub fn where_raw(&mut self, sql: impl Into<String>, bindings: Vec<Parameter>) -> &mut Self {
        self.push_raw_where(Expression::with_bindings(sql, bindings), Conjunction::And)
    }

    /// Adds `or <sql>` with its own bindings.
    pub fn or_where_raw(&mut self, sql: impl Into<String>, bindings: Vec<Parameter>) -> &mut Self {
        self.push_raw_where(Expression::with_bindings(sql, bindings), Conjunction::Or)
    }

    fn push_raw_where(&mut self, expr: Expression, conjunction: Conjunction) -> &mut Self {
        self.parts.wheres.push(WhereClause {
            predicate: Predicate::Raw(expr),
            conjunction,
            negate: false,
        });
        self
    }

    /// Adds `and (...)`, built by `build` on a fresh query.
    ///
    /// An empty group adds nothing.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by `build`.
    pub fn where_nested<F>(&mut self, build: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.where_nested_with(Conjunction::And, false, build)
    }

    /// Adds `or (...)`, built by `build` on a fresh query.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by `build`.
    pub fn or_where_nested<F>(&mut self, build: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.where_nested_with(Conjunction::Or, false, build)
    }

    /// Adds a parenthesized group with an explicit connective and negation.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by `build`.
    pub fn where_nested_with<F>(
        &mut self,
        conjunction: Conjunction,
        negate: bool,
        build: F,
    ) -> Result<&mut Self>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let mut nested = self.fork();
        build(&mut nested)?;
        if !nested.parts.wheres.is_empty() {
            self.parts.wheres.push(WhereClause {
                predicate: Predicate::Nested(nested.parts.wheres),
                conjunction,
                negate,
            });
        }
        Ok(self)
    }

    /// Removes every where clause.
    pub fn clear_where(&mut self) -> &mut Self {
        self.parts.wheres.clear();
        self
    }

    // ------------------------------------------------------------------
    // grouping, ordering, pagination
    // ------------------------------------------------------------------

    /// Adds group-by columns.
    pub fn group_by<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parts
            .group_by
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Adds `and column <op> value` to the having list.
    ///
    /// # Errors
    ///
    /// See [`Query::where_op`].
    pub fn having_op(
        &mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl ToParameter,
    ) -> Result<&mut Self> {
        self.having_op_with(column, operator, value, Conjunction::And, false)
    }

    /// Adds `or column <op> value` to the having list.
    ///
    /// # Errors
    ///
    /// See [`Query::where_op`].
    pub fn or_having_op(
        &mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl ToParameter,
    ) -> Result<&mut Self> {
        self.having_op_with(column, operator, value, Conjunction::Or, false)
    }

    /// Adds a having comparison with an explicit connective and negation.
    ///
    /// # Errors
    ///
    /// See [`Query::where_op_with`].
    pub fn having_op_with(
        &mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl ToParameter,
        conjunction: Conjunction,
        negate: bool,
    ) -> Result<&mut Self> {
        let value = value.to_parameter();
        let operator = self.checked_operator(operator, &value)?;
        self.parts.having.push(HavingClause {
            predicate: HavingPredicate::Operation {
                column: column.into(),
                operator,
                value,
            },
            conjunction,
            negate,
        });
        Ok(self)
    }

    /// Adds `and <sql>` to the having list.
    pub fn having_raw(&mut self, sql: impl Into<String>, bindings: Vec<Parameter>) -> &mut Self {
        self.push_raw_having(Expression::with_bindings(sql, bindings), Conjunction::And)
    }

    /// Adds `or <sql>` to the having list.
    pub fn or_having_raw(&mut self, sql: impl Into<String>, bindings: Vec<Parameter>) -> &mut Self {
        self.push_raw_having(Expression::with_bindings(sql, bindings), Conjunction::Or)
    }

    fn push_raw_having(&mut self, expr: Expression, conjunction: Conjunction) -> &mut Self {
        self.parts.having.push(HavingClause {
            predicate: HavingPredicate::Raw(expr),
            conjunction,
            negate: false,
        });
        self
    }

    /// Adds an order-by term.
    pub fn order_by(&mut self, column: impl AsRef<str>, direction: Direction) -> &mut Self {
        self.parts
            .order_by
            .push(format!("{} {}", column.as_ref(), direction.as_sql()));
        self
    }

    /// Adds a descending order-by term.
    pub fn order_by_desc(&mut self, column: impl AsRef<str>) -> &mut Self {
        self.order_by(column, Direction::Desc)
    }

    /// Sets the row limit.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.parts.limit = Some(limit);
        self
    }

    /// Sets the row offset.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.parts.offset = Some(offset);
        self
    }

    /// Sets limit and offset for a 1-based page number.
    pub fn for_page(&mut self, page: u64, per_page: u64) -> &mut Self {
        self.limit(per_page)
            .offset(page.saturating_sub(1).saturating_mul(per_page))
    }

    // ------------------------------------------------------------------
    // joins
    // ------------------------------------------------------------------

    /// Adds an inner join.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnsupportedOperator`] if any condition uses a
    /// disallowed operator.
    pub fn inner_join(&mut self, table: impl Into<String>, on: impl Into<JoinOn>) -> Result<&mut Self> {
        self.join(JoinType::Inner, table, on)
    }

    /// Adds a left join.
    ///
    /// # Errors
    ///
    /// See [`Query::inner_join`].
    pub fn left_join(&mut self, table: impl Into<String>, on: impl Into<JoinOn>) -> Result<&mut Self> {
        self.join(JoinType::Left, table, on)
    }

    /// Adds a right join.
    ///
    /// # Errors
    ///
    /// See [`Query::inner_join`].
    pub fn right_join(&mut self, table: impl Into<String>, on: impl Into<JoinOn>) -> Result<&mut Self> {
        self.join(JoinType::Right, table, on)
    }

    /// Adds a full outer join.
    ///
    /// # Errors
    ///
    /// See [`Query::inner_join`]; also [`BuildError::Unsupported`] on
    /// dialects without full joins.
    pub fn full_join(&mut self, table: impl Into<String>, on: impl Into<JoinOn>) -> Result<&mut Self> {
        self.join(JoinType::Full, table, on)
    }

    /// Adds a cross join.
    pub fn cross_join(&mut self, table: impl Into<String>) -> &mut Self {
        self.parts.joins.push(JoinClause {
            join_type: JoinType::Cross,
            table: table.into(),
            conditions: Vec::new(),
        });
        self
    }

    /// Adds a join of any type.
    ///
    /// # Errors
    ///
    /// See [`Query::full_join`]. Non-cross joins need at least one condition.
    pub fn join(
        &mut self,
        join_type: JoinType,
        table: impl Into<String>,
        on: impl Into<JoinOn>,
    ) -> Result<&mut Self> {
        if !self.grammar.supports_join(join_type) {
            return Err(BuildError::Unsupported {
                feature: join_type.as_sql().to_string(),
                dialect: self.grammar.dialect(),
            });
        }

        let table = table.into();
        let conditions = on
            .into()
            .into_clauses()
            .into_iter()
            .map(|clause| self.checked_clause(clause))
            .collect::<Result<Vec<_>>>()?;

        if conditions.is_empty() && join_type != JoinType::Cross {
            return Err(BuildError::MissingInput(format!(
                "{join_type} {table} needs at least one condition"
            )));
        }

        self.parts.joins.push(JoinClause {
            join_type,
            table,
            conditions,
        });
        Ok(self)
    }

    // ------------------------------------------------------------------
    // compilation
    // ------------------------------------------------------------------

    /// Compiles the select statement. Pure: the query is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingTable`] if no table is set.
    pub fn to_sql(&self) -> Result<CompiledSql> {
        self.grammar.compile_select(&self.parts)
    }

    /// Compiles the count statement.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingTable`] if no table is set.
    pub fn compile_count(&self) -> Result<CompiledSql> {
        self.grammar.compile_count(&self.parts)
    }

    /// Compiles an insert of one or more rows.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::EmptyInsert`] for an empty slice.
    pub fn compile_insert(&self, rows: &[Record]) -> Result<CompiledSql> {
        self.grammar.compile_insert(self.require_table()?, rows)
    }

    /// Compiles an insert that reports generated keys.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingTable`] if no table is set.
    pub fn compile_insert_get_id(
        &self,
        row: &Record,
        options: &InsertGetIdOptions,
    ) -> Result<CompiledSql> {
        self.grammar
            .compile_insert_get_id(self.require_table()?, row, &options.primary_keys)
    }

    /// Compiles an update of the matched rows.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::EmptyUpdate`] if `values` is empty.
    pub fn compile_update(&self, values: &Record) -> Result<CompiledSql> {
        self.grammar.compile_update(&self.parts, values)
    }

    /// Compiles a delete of the matched rows.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingTable`] if no table is set.
    pub fn compile_delete(&self) -> Result<CompiledSql> {
        self.grammar.compile_delete(&self.parts)
    }

    /// Compiles an upsert keyed by `conflict`, updating `update` on conflict.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::EmptyInsert`] for an empty slice and
    /// [`BuildError::MissingInput`] without conflict columns.
    pub fn compile_upsert(
        &self,
        rows: &[Record],
        conflict: &[&str],
        update: &[&str],
    ) -> Result<CompiledSql> {
        let conflict: Vec<String> = conflict.iter().map(ToString::to_string).collect();
        let update: Vec<String> = update.iter().map(ToString::to_string).collect();
        self.grammar
            .compile_upsert(self.require_table()?, rows, &conflict, &update)
    }

    fn require_table(&self) -> Result<&str> {
        self.parts.table.as_deref().ok_or(BuildError::MissingTable)
    }

    /// Validates an operator against the grammar and its operand.
    fn checked_operator(&self, operator: &str, value: &Parameter) -> Result<String> {
        let operator = self.grammar.validate_operator(operator)?;
        if matches!(operator.as_str(), "in" | "not in")
            && !matches!(value, Parameter::Array(_) | Parameter::Expression(_))
        {
            return Err(BuildError::InvalidOperand {
                operator,
                expected: "a list or an expression",
            });
        }
        Ok(operator)
    }

    /// Validates every operator in a clause handed in from outside.
    fn checked_clause(&self, mut clause: WhereClause) -> Result<WhereClause> {
        clause.predicate = match clause.predicate {
            Predicate::Operation {
                column,
                operator,
                value,
            } => Predicate::Operation {
                operator: self.checked_operator(&operator, &value)?,
                column,
                value,
            },
            Predicate::OperationColumn {
                first,
                operator,
                second,
            } => Predicate::OperationColumn {
                operator: self.grammar.validate_operator(&operator)?,
                first,
                second,
            },
            Predicate::Nested(clauses) => Predicate::Nested(
                clauses
                    .into_iter()
                    .map(|clause| self.checked_clause(clause))
                    .collect::<Result<Vec<_>>>()?,
            ),
            other @ (Predicate::Null { .. } | Predicate::Raw(_)) => other,
        };
        Ok(clause)
    }
}
