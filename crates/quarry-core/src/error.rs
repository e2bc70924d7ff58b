//! Error types for query building and compilation.

use crate::grammar::Dialect;

/// Errors raised while building or compiling a query or blueprint.
///
/// These are detected before anything reaches a database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// The operator is not in the dialect's allow-list.
    #[error("Operator '{operator}' is not supported by the {dialect} grammar")]
    UnsupportedOperator {
        /// The rejected operator, as given.
        operator: String,
        /// The dialect that rejected it.
        dialect: Dialect,
    },

    /// The operand does not fit the operator (e.g. `in` with a scalar).
    #[error("Operator '{operator}' requires {expected}")]
    InvalidOperand {
        /// The operator.
        operator: String,
        /// What the operator expects.
        expected: &'static str,
    },

    /// A batch insert was given no rows.
    #[error("Cannot compile an insert with an empty list of records")]
    EmptyInsert,

    /// A batch insert row does not have the same columns as the first row.
    #[error("Insert row {row} does not provide column '{column}'")]
    MismatchedRow {
        /// Zero-based row index.
        row: usize,
        /// The missing column.
        column: String,
    },

    /// An update was given no columns.
    #[error("Cannot compile an update without any columns")]
    EmptyUpdate,

    /// No table was set on the query.
    #[error("Query has no table")]
    MissingTable,

    /// A required builder input is missing.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// The dialect cannot express the requested construct.
    #[error("{feature} is not supported by the {dialect} grammar")]
    Unsupported {
        /// The construct.
        feature: String,
        /// The dialect.
        dialect: Dialect,
    },

    /// A raw expression's placeholders and bindings disagree.
    #[error("Expression '{sql}' has {placeholders} placeholder(s) but {bindings} binding(s)")]
    ExpressionBindings {
        /// The expression text.
        sql: String,
        /// Placeholders found by the tokenizer.
        placeholders: usize,
        /// Bindings supplied.
        bindings: usize,
    },

    /// An identifier failed validation.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
}

/// The kind of literal the tokenizer was inside when input ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    /// `'...'`
    String,
    /// `"..."` or `` `...` ``
    QuotedIdentifier,
    /// `/* ... */`
    BlockComment,
    /// `$tag$ ... $tag$`
    DollarQuoted,
}

impl std::fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string literal",
            Self::QuotedIdentifier => "quoted identifier",
            Self::BlockComment => "block comment",
            Self::DollarQuoted => "dollar-quoted string",
        };
        f.write_str(name)
    }
}

/// The placeholder tokenizer could not split a raw SQL fragment.
///
/// Compilation never fails on this: the fragment is used as one opaque part.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unterminated {kind} starting at byte {offset}")]
pub struct TokenizeError {
    /// What was left open.
    pub kind: LiteralKind,
    /// Byte offset where it started.
    pub offset: usize,
}

/// An identifier failed the allow-list used for administrative DDL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// The identifier is empty.
    #[error("Identifier must not be empty")]
    Empty,

    /// The identifier is longer than the limit.
    #[error("Identifier '{name}' is longer than {max} characters")]
    TooLong {
        /// The rejected identifier.
        name: String,
        /// The maximum length.
        max: usize,
    },

    /// The identifier contains a disallowed character.
    #[error("Identifier '{name}' contains invalid character {character:?} at position {position}")]
    InvalidCharacter {
        /// The rejected identifier.
        name: String,
        /// The first offending character.
        character: char,
        /// Its character index.
        position: usize,
    },
}

/// Result type for build and compile operations.
pub type Result<T> = std::result::Result<T, BuildError>;
