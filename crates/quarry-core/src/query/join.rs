//! Join conditions.

use super::parts::{Conjunction, WhereClause};
use crate::value::ToParameter;

/// The `on` part of a join.
///
/// A `(first, second)` tuple converts to a single `first = second` condition:
///
/// ```rust
/// use quarry_core::query::JoinOn;
///
/// let on: JoinOn = ("users.id", "posts.user_id").into();
/// assert_eq!(on.clauses().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinOn {
    clauses: Vec<WhereClause>,
}

impl JoinOn {
    /// Creates an empty condition list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Adds `and first <op> second`.
    #[must_use]
    pub fn on(self, first: impl Into<String>, operator: &str, second: impl Into<String>) -> Self {
        self.push(WhereClause::columns(first, operator, second))
    }

    /// Adds `or first <op> second`.
    #[must_use]
    pub fn or_on(self, first: impl Into<String>, operator: &str, second: impl Into<String>) -> Self {
        self.push(WhereClause::columns(first, operator, second).conjunction(Conjunction::Or))
    }

    /// Adds `and column <op> value`.
    #[must_use]
    pub fn on_value(self, column: impl Into<String>, operator: &str, value: impl ToParameter) -> Self {
        self.push(WhereClause::operation(column, operator, value.to_parameter()))
    }

    /// Adds `or column <op> value`.
    #[must_use]
    pub fn or_on_value(self, column: impl Into<String>, operator: &str, value: impl ToParameter) -> Self {
        self.push(
            WhereClause::operation(column, operator, value.to_parameter())
                .conjunction(Conjunction::Or),
        )
    }

    /// Adds a fully specified clause.
    #[must_use]
    pub fn push(mut self, clause: WhereClause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Returns the clauses.
    #[must_use]
    pub fn clauses(&self) -> &[WhereClause] {
        &self.clauses
    }

    /// Consumes the list, returning the clauses.
    #[must_use]
    pub fn into_clauses(self) -> Vec<WhereClause> {
        self.clauses
    }
}

impl<A: Into<String>, B: Into<String>> From<(A, B)> for JoinOn {
    fn from((first, second): (A, B)) -> Self {
        Self::new().on(first, "=", second)
    }
}

impl From<Vec<WhereClause>> for JoinOn {
    fn from(clauses: Vec<WhereClause>) -> Self {
        Self { clauses }
    }
}

impl From<WhereClause> for JoinOn {
    fn from(clause: WhereClause) -> Self {
        Self {
            clauses: vec![clause],
        }
    }
}
