//! Schema building: blueprints and the grammars that turn them into DDL.

mod blueprint;
pub mod grammar;

pub use blueprint::{
    Blueprint, BlueprintMode, ColumnDefinition, ColumnType, ForeignKeyConstraint, IndexDefinition,
    ReferentialAction,
};
pub use grammar::{MySqlSchemaGrammar, PostgresSchemaGrammar, SchemaGrammar, SqliteSchemaGrammar};
