//! Raw SQL fragments.

use std::fmt;
use std::sync::OnceLock;

use tracing::warn;

use crate::error::TokenizeError;
use crate::lexer::{split_placeholders, StringEscapes};
use crate::value::{Parameter, ToParameter};

/// A raw SQL fragment with its own positional bindings.
///
/// Expressions are spliced verbatim into compiled SQL. Use them for things that
/// must not be parameterized, such as `CURRENT_TIMESTAMP` defaults or
/// `views + 1` in an update.
///
/// ```rust
/// use quarry_core::{Expression, Parameter};
///
/// let expr = Expression::with_bindings("price * ?", vec![Parameter::Int(2)]);
/// assert_eq!(expr.parts(), vec!["price * ", ""]);
/// ```
#[derive(Clone)]
pub struct Expression {
    sql: String,
    bindings: Vec<Parameter>,
    /// Tokenized parts, per [`StringEscapes`] mode.
    parts: [OnceLock<Result<Vec<String>, TokenizeError>>; 2],
}

impl Expression {
    /// Creates an expression without bindings.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self::with_bindings(sql, Vec::new())
    }

    /// Creates an expression with positional bindings for its `?` placeholders.
    #[must_use]
    pub fn with_bindings(sql: impl Into<String>, bindings: Vec<Parameter>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
            parts: [OnceLock::new(), OnceLock::new()],
        }
    }

    /// Shorthand for `CURRENT_TIMESTAMP`.
    #[must_use]
    pub fn current_timestamp() -> Self {
        Self::new("CURRENT_TIMESTAMP")
    }

    /// Returns the SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the bindings.
    #[must_use]
    pub fn bindings(&self) -> &[Parameter] {
        &self.bindings
    }

    /// Returns the tokenizer result with standard string escapes, computing it
    /// on first use.
    pub fn tokenize(&self) -> Result<&[String], &TokenizeError> {
        self.tokenize_with(StringEscapes::Standard)
    }

    /// Returns the tokenizer result for a dialect's string escapes.
    pub fn tokenize_with(&self, escapes: StringEscapes) -> Result<&[String], &TokenizeError> {
        let slot = match escapes {
            StringEscapes::Standard => &self.parts[0],
            StringEscapes::Backslash => &self.parts[1],
        };
        slot.get_or_init(|| split_placeholders(&self.sql, escapes))
            .as_ref()
            .map(Vec::as_slice)
    }

    /// Returns the text segments between placeholders.
    ///
    /// If the fragment cannot be tokenized it is returned whole as a single
    /// opaque part.
    #[must_use]
    pub fn parts(&self) -> Vec<&str> {
        match self.tokenize() {
            Ok(parts) => parts.iter().map(String::as_str).collect(),
            Err(err) => {
                warn!(sql = %self.sql, error = %err, "Treating expression as opaque SQL");
                vec![self.sql.as_str()]
            }
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("sql", &self.sql)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.sql == other.sql && self.bindings == other.bindings
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Creates an [`Expression`] from SQL text and bindings.
pub fn raw(sql: impl Into<String>, bindings: impl IntoIterator<Item = impl ToParameter>) -> Expression {
    Expression::with_bindings(
        sql,
        bindings.into_iter().map(ToParameter::to_parameter).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_are_cached() {
        let expr = Expression::new("a = ? and b = ?");
        let first = expr.tokenize().unwrap().as_ptr();
        let second = expr.tokenize().unwrap().as_ptr();
        assert_eq!(first, second);
        assert_eq!(expr.parts(), vec!["a = ", " and b = ", ""]);
    }

    #[test]
    fn test_unterminated_expression_is_opaque() {
        let expr = Expression::new("name = 'broken");
        assert!(expr.tokenize().is_err());
        assert_eq!(expr.parts(), vec!["name = 'broken"]);
    }

    #[test]
    fn test_equality_ignores_cache() {
        let a = Expression::new("x + 1");
        let b = Expression::new("x + 1");
        let _ = a.parts();
        assert_eq!(a, b);
    }

    #[test]
    fn test_raw_helper() {
        let expr = raw("price between ? and ?", [10, 20]);
        assert_eq!(expr.bindings(), &[Parameter::Int(10), Parameter::Int(20)]);
    }

    #[test]
    fn test_tokenize_per_escape_mode() {
        let expr = Expression::new("name = 'it\\'s' and id = ?");
        assert!(expr.tokenize().is_err());
        assert_eq!(
            expr.tokenize_with(StringEscapes::Backslash).unwrap(),
            &["name = 'it\\'s' and id = ".to_string(), String::new()]
        );

        let expr = Expression::new("path = 'C:\\' or id = ?");
        assert_eq!(expr.parts(), vec!["path = 'C:\\' or id = ", ""]);
    }
}
