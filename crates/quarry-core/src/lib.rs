//! # quarry-core
//!
//! A dialect-portable SQL query and schema compiler.
//!
//! This crate provides:
//! - A fluent [`Query`] builder over an explicit AST ([`query::parts`])
//! - Per-dialect [`QueryGrammar`]s for PostgreSQL, MySQL and SQLite
//! - [`Blueprint`]s and [`SchemaGrammar`]s for DDL
//!
//! Nothing here talks to a database. Every statement compiles to a
//! [`CompiledSql`]: text with `?` placeholders plus its ordered bindings.
//!
//! ## Building Queries
//!
//! ```rust
//! use quarry_core::{Dialect, Direction, Parameter, Query};
//!
//! let mut query = Query::new(Dialect::MySql.query_grammar());
//! query
//!     .table("users")
//!     .select(["id", "email"])
//!     .where_op("active", "=", true)?
//!     .where_in("role", vec!["admin", "owner"])?
//!     .order_by("email", Direction::Asc)
//!     .limit(10);
//!
//! let compiled = query.to_sql()?;
//! assert_eq!(
//!     compiled.sql(),
//!     "select id, email from users where active = ? and role in (?, ?) order by email asc limit 10"
//! );
//! assert_eq!(compiled.bindings()[0], Parameter::Bool(true));
//! # Ok::<(), quarry_core::BuildError>(())
//! ```
//!
//! ## Placeholders
//!
//! Grammars always emit `?`. Dialects that number their placeholders render
//! them when the statement is executed:
//!
//! ```rust
//! use quarry_core::{Dialect, PlaceholderStyle, Query};
//!
//! let mut query = Query::new(Dialect::Postgres.query_grammar());
//! query.table("users").where_op("name", "=", "it's ?")?.where_op("id", ">", 3)?;
//!
//! let compiled = query.to_sql()?;
//! assert_eq!(
//!     compiled.render(PlaceholderStyle::Numbered),
//!     "select * from users where name = $1 and id > $2"
//! );
//! # Ok::<(), quarry_core::BuildError>(())
//! ```

pub mod compiled;
pub mod error;
pub mod expression;
pub mod grammar;
pub mod identifier;
pub mod lexer;
pub mod query;
pub mod schema;
pub mod value;

pub use compiled::{CompiledSql, PlaceholderStyle, SqlWriter, StatementKind};
pub use error::{BuildError, IdentifierError, Result, TokenizeError};
pub use expression::{raw, Expression};
pub use grammar::{Dialect, MySqlGrammar, PostgresGrammar, QueryGrammar, SqliteGrammar};
pub use identifier::validate_identifier;
pub use lexer::{split_statements, StringEscapes};
pub use query::{Conjunction, Direction, InsertGetIdOptions, JoinOn, JoinType, Query};
pub use schema::{
    Blueprint, ColumnDefinition, ColumnType, ForeignKeyConstraint, MySqlSchemaGrammar,
    PostgresSchemaGrammar, ReferentialAction, SchemaGrammar, SqliteSchemaGrammar,
};
pub use value::{Parameter, Record, ToParameter};
