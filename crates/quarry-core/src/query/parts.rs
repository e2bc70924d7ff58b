//! The query AST.
//!
//! Clause lists are kept in append order. Each clause carries the boolean
//! connective that joins it to the clause before it, so the compiled SQL reads
//! left to right exactly as the clauses were added.

use std::fmt;

use crate::expression::Expression;
use crate::value::Parameter;

/// Boolean connective between two clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    /// `and`
    #[default]
    And,
    /// `or`
    Or,
}

impl Conjunction {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// `asc`
    #[default]
    Asc,
    /// `desc`
    Desc,
}

impl Direction {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A where-clause predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column <op> value`
    Operation {
        /// Left-hand column.
        column: String,
        /// Validated, lower-cased operator.
        operator: String,
        /// Right-hand value.
        value: Parameter,
    },
    /// `column <op> column`
    OperationColumn {
        /// Left-hand column.
        first: String,
        /// Validated, lower-cased operator.
        operator: String,
        /// Right-hand column.
        second: String,
    },
    /// `column is null`
    Null {
        /// The tested column.
        column: String,
    },
    /// A parenthesized group of clauses.
    Nested(Vec<WhereClause>),
    /// Literal SQL with its own bindings.
    Raw(Expression),
}

/// A where or join clause.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    /// The predicate.
    pub predicate: Predicate,
    /// How this clause joins the one before it. Ignored for the first clause.
    pub conjunction: Conjunction,
    /// Whether the predicate is wrapped in `not`.
    pub negate: bool,
}

impl WhereClause {
    /// Creates an `and`, non-negated clause.
    #[must_use]
    pub const fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            conjunction: Conjunction::And,
            negate: false,
        }
    }

    /// Sets the connective.
    #[must_use]
    pub const fn conjunction(mut self, conjunction: Conjunction) -> Self {
        self.conjunction = conjunction;
        self
    }

    /// Sets the negate flag.
    #[must_use]
    pub const fn negate(mut self, negate: bool) -> Self {
        self.negate = negate;
        self
    }

    /// Creates a column-to-column comparison.
    #[must_use]
    pub fn columns(first: impl Into<String>, operator: impl Into<String>, second: impl Into<String>) -> Self {
        Self::new(Predicate::OperationColumn {
            first: first.into(),
            operator: operator.into(),
            second: second.into(),
        })
    }

    /// Creates a column-to-value comparison.
    #[must_use]
    pub fn operation(column: impl Into<String>, operator: impl Into<String>, value: Parameter) -> Self {
        Self::new(Predicate::Operation {
            column: column.into(),
            operator: operator.into(),
            value,
        })
    }
}

/// A having-clause predicate. Only comparisons and raw SQL are allowed.
#[derive(Debug, Clone, PartialEq)]
pub enum HavingPredicate {
    /// `column <op> value`
    Operation {
        /// Left-hand column or aggregate.
        column: String,
        /// Validated, lower-cased operator.
        operator: String,
        /// Right-hand value.
        value: Parameter,
    },
    /// Literal SQL with its own bindings.
    Raw(Expression),
}

/// A having clause.
#[derive(Debug, Clone, PartialEq)]
pub struct HavingClause {
    /// The predicate.
    pub predicate: HavingPredicate,
    /// How this clause joins the one before it.
    pub conjunction: Conjunction,
    /// Whether the predicate is wrapped in `not`.
    pub negate: bool,
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// `inner join`
    Inner,
    /// `left join`
    Left,
    /// `right join`
    Right,
    /// `full join`
    Full,
    /// `cross join`
    Cross,
}

impl JoinType {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "inner join",
            Self::Left => "left join",
            Self::Right => "right join",
            Self::Full => "full join",
            Self::Cross => "cross join",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// Join type.
    pub join_type: JoinType,
    /// Joined table.
    pub table: String,
    /// `on` conditions, empty for cross joins.
    pub conditions: Vec<WhereClause>,
}

/// Everything a query is made of.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParts {
    /// Selected columns; empty means `*`.
    pub select: Vec<String>,
    /// Whether to select distinct rows.
    pub distinct: bool,
    /// Target table.
    pub table: Option<String>,
    /// Joins.
    pub joins: Vec<JoinClause>,
    /// Where clauses.
    pub wheres: Vec<WhereClause>,
    /// Group-by columns.
    pub group_by: Vec<String>,
    /// Having clauses.
    pub having: Vec<HavingClause>,
    /// Rendered order-by terms (`column direction`).
    pub order_by: Vec<String>,
    /// Row limit.
    pub limit: Option<u64>,
    /// Row offset.
    pub offset: Option<u64>,
}
