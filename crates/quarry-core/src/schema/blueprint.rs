//! Table blueprints.
//!
//! A [`Blueprint`] collects the columns, keys and indexes of one table and is
//! handed to a [`SchemaGrammar`](super::grammar::SchemaGrammar) to produce DDL.

use crate::expression::Expression;
use crate::value::{Parameter, ToParameter};

/// Logical column types. Each schema grammar maps them to a native type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Auto-incrementing 32-bit integer key.
    Increments,
    /// Auto-incrementing 64-bit integer key.
    BigIncrements,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// 16-bit integer.
    SmallInteger,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Fixed-point decimal.
    Decimal {
        /// Total digits.
        precision: u8,
        /// Digits after the point.
        scale: u8,
    },
    /// Variable-length string with a maximum length.
    String(u32),
    /// Fixed-length string.
    Char(u32),
    /// Unbounded text.
    Text,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Timestamp without time zone.
    Timestamp,
    /// Timestamp with time zone.
    TimestampTz,
    /// JSON document.
    Json,
    /// Binary JSON document where the dialect has one.
    Jsonb,
    /// UUID.
    Uuid,
    /// Binary data.
    Binary,
}

impl ColumnType {
    /// Returns whether the database generates values for this column.
    #[must_use]
    pub const fn is_auto_increment(self) -> bool {
        matches!(self, Self::Increments | Self::BigIncrements)
    }
}

/// A column in a blueprint.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    name: String,
    column_type: ColumnType,
    nullable: bool,
    unique: bool,
    default: Option<Parameter>,
}

impl ColumnDefinition {
    /// Creates a `not null` column without default.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            unique: false,
            default: None,
        }
    }

    /// Allows nulls.
    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    /// Adds a unique constraint.
    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    /// Sets the default. Expressions are emitted verbatim.
    pub fn default(&mut self, value: impl ToParameter) -> &mut Self {
        self.default = Some(value.to_parameter());
        self
    }

    /// Defaults to the current timestamp.
    pub fn use_current(&mut self) -> &mut Self {
        self.default(Expression::current_timestamp())
    }

    /// Returns the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the logical type.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Returns whether nulls are allowed.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns whether the column is unique.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    /// Returns the default value.
    #[must_use]
    pub const fn default_value(&self) -> Option<&Parameter> {
        self.default.as_ref()
    }
}

/// What happens to referencing rows when the referenced row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    /// `cascade`
    Cascade,
    /// `restrict`
    Restrict,
    /// `set null`
    SetNull,
    /// `set default`
    SetDefault,
    /// `no action`
    NoAction,
}

impl ReferentialAction {
    /// Returns the SQL keywords.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Cascade => "cascade",
            Self::Restrict => "restrict",
            Self::SetNull => "set null",
            Self::SetDefault => "set default",
            Self::NoAction => "no action",
        }
    }
}

/// A foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    columns: Vec<String>,
    references: Vec<String>,
    on: Option<String>,
    on_delete: Option<ReferentialAction>,
    on_update: Option<ReferentialAction>,
}

impl ForeignKeyConstraint {
    fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            references: Vec::new(),
            on: None,
            on_delete: None,
            on_update: None,
        }
    }

    /// Sets the referenced column.
    pub fn references(&mut self, column: impl Into<String>) -> &mut Self {
        self.references = vec![column.into()];
        self
    }

    /// Sets the referenced table.
    pub fn on(&mut self, table: impl Into<String>) -> &mut Self {
        self.on = Some(table.into());
        self
    }

    /// Sets the delete action.
    pub fn on_delete(&mut self, action: ReferentialAction) -> &mut Self {
        self.on_delete = Some(action);
        self
    }

    /// Sets the update action.
    pub fn on_update(&mut self, action: ReferentialAction) -> &mut Self {
        self.on_update = Some(action);
        self
    }

    /// Returns the local columns.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the referenced columns, `id` when none were given.
    #[must_use]
    pub fn referenced_columns(&self) -> Vec<String> {
        if self.references.is_empty() {
            vec!["id".to_string()]
        } else {
            self.references.clone()
        }
    }

    /// Returns the referenced table.
    #[must_use]
    pub fn referenced_table(&self) -> Option<&str> {
        self.on.as_deref()
    }

    /// Returns the delete action.
    #[must_use]
    pub const fn delete_action(&self) -> Option<ReferentialAction> {
        self.on_delete
    }

    /// Returns the update action.
    #[must_use]
    pub const fn update_action(&self) -> Option<ReferentialAction> {
        self.on_update
    }
}

/// An index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    name: String,
    columns: Vec<String>,
    unique: bool,
}

impl IndexDefinition {
    /// Overrides the generated name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    /// Returns the index name.
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.name
    }

    /// Returns the indexed columns.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns whether the index is unique.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }
}

/// Whether a blueprint creates a table or changes an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlueprintMode {
    /// `create table`
    Create,
    /// `alter table`
    Alter,
}

/// The description of a table to create or alter.
///
/// ```rust
/// use quarry_core::schema::{Blueprint, ReferentialAction};
///
/// let mut table = Blueprint::create("posts");
/// table.id();
/// table.string("title", 200);
/// table.text("body").nullable();
/// table.integer("user_id");
/// table
///     .foreign("user_id")
///     .references("id")
///     .on("users")
///     .on_delete(ReferentialAction::Cascade);
/// table.timestamps();
///
/// assert_eq!(table.columns().len(), 6);
/// assert_eq!(table.primary_keys(), ["id"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    table: String,
    mode: BlueprintMode,
    columns: Vec<ColumnDefinition>,
    primary_keys: Vec<String>,
    foreign_keys: Vec<ForeignKeyConstraint>,
    indexes: Vec<IndexDefinition>,
    dropped_columns: Vec<String>,
    dropped_indexes: Vec<String>,
}

impl Blueprint {
    fn new(table: impl Into<String>, mode: BlueprintMode) -> Self {
        Self {
            table: table.into(),
            mode,
            columns: Vec::new(),
            primary_keys: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            dropped_columns: Vec::new(),
            dropped_indexes: Vec::new(),
        }
    }

    /// Starts a blueprint for a new table.
    #[must_use]
    pub fn create(table: impl Into<String>) -> Self {
        Self::new(table, BlueprintMode::Create)
    }

    /// Starts a blueprint that changes an existing table.
    #[must_use]
    pub fn alter(table: impl Into<String>) -> Self {
        Self::new(table, BlueprintMode::Alter)
    }

    /// Adds a column of any type.
    pub fn column(&mut self, name: impl Into<String>, column_type: ColumnType) -> &mut ColumnDefinition {
        let column = ColumnDefinition::new(name, column_type);
        if column_type.is_auto_increment() && !self.primary_keys.contains(&column.name) {
            self.primary_keys.push(column.name.clone());
        }
        let index = self.columns.len();
        self.columns.push(column);
        &mut self.columns[index]
    }

    /// Adds an auto-incrementing `id` primary key.
    pub fn id(&mut self) -> &mut ColumnDefinition {
        self.increments("id")
    }

    /// Adds an auto-incrementing 32-bit primary key.
    pub fn increments(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Increments)
    }

    /// Adds an auto-incrementing 64-bit primary key.
    pub fn big_increments(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::BigIncrements)
    }

    /// Adds a 32-bit integer column.
    pub fn integer(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Integer)
    }

    /// Adds a 64-bit integer column.
    pub fn big_integer(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::BigInteger)
    }

    /// Adds a 16-bit integer column.
    pub fn small_integer(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::SmallInteger)
    }

    /// Adds a single-precision float column.
    pub fn float(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Float)
    }

    /// Adds a double-precision float column.
    pub fn double(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Double)
    }

    /// Adds a fixed-point `DECIMAL(precision, scale)` column.
    pub fn decimal(&mut self, name: impl Into<String>, precision: u8, scale: u8) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Decimal { precision, scale })
    }

    /// Adds a `VARCHAR(length)` column.
    pub fn string(&mut self, name: impl Into<String>, length: u32) -> &mut ColumnDefinition {
        self.column(name, ColumnType::String(length))
    }

    /// Adds a fixed-length `CHAR(length)` column.
    pub fn char(&mut self, name: impl Into<String>, length: u32) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Char(length))
    }

    /// Adds an unbounded text column.
    pub fn text(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Text)
    }

    /// Adds a boolean column.
    pub fn boolean(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Boolean)
    }

    /// Adds a date column.
    pub fn date(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Date)
    }

    /// Adds a time-of-day column.
    pub fn time(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Time)
    }

    /// Adds a timestamp column without time zone.
    pub fn timestamp(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Timestamp)
    }

    /// Adds a timestamp column with time zone.
    pub fn timestamptz(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::TimestampTz)
    }

    /// Adds a JSON column.
    pub fn json(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Json)
    }

    /// Adds a binary JSON column. MySQL stores it as plain `JSON`.
    pub fn jsonb(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Jsonb)
    }

    /// Adds a UUID column.
    pub fn uuid(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Uuid)
    }

    /// Adds a binary column.
    pub fn binary(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Binary)
    }

    /// Adds `created_at` and `updated_at`, both defaulting to now.
    pub fn timestamps(&mut self) {
        self.timestamp("created_at").use_current();
        self.timestamp("updated_at").use_current();
    }

    /// Sets the primary key columns.
    pub fn primary<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = columns.into_iter().map(Into::into).collect();
    }

    /// Adds a foreign key on `column`.
    pub fn foreign(&mut self, column: impl Into<String>) -> &mut ForeignKeyConstraint {
        let index = self.foreign_keys.len();
        self.foreign_keys
            .push(ForeignKeyConstraint::new(vec![column.into()]));
        &mut self.foreign_keys[index]
    }

    /// Adds an index named `<table>_<columns>_index`.
    pub fn index<I, S>(&mut self, columns: I) -> &mut IndexDefinition
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_index(columns, false)
    }

    /// Adds a unique index named `<table>_<columns>_unique`.
    pub fn unique_index<I, S>(&mut self, columns: I) -> &mut IndexDefinition
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_index(columns, true)
    }

    fn push_index<I, S>(&mut self, columns: I, unique: bool) -> &mut IndexDefinition
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let suffix = if unique { "unique" } else { "index" };
        let name = format!("{}_{}_{suffix}", self.table, columns.join("_"));
        let index = self.indexes.len();
        self.indexes.push(IndexDefinition {
            name,
            columns,
            unique,
        });
        &mut self.indexes[index]
    }

    /// Drops a column (alter only).
    pub fn drop_column(&mut self, name: impl Into<String>) {
        self.dropped_columns.push(name.into());
    }

    /// Drops an index by name (alter only).
    pub fn drop_index(&mut self, name: impl Into<String>) {
        self.dropped_indexes.push(name.into());
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns whether this creates or alters.
    #[must_use]
    pub const fn mode(&self) -> BlueprintMode {
        self.mode
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Primary key columns.
    #[must_use]
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    /// Foreign key constraints.
    #[must_use]
    pub fn foreign_keys(&self) -> &[ForeignKeyConstraint] {
        &self.foreign_keys
    }

    /// Indexes to create.
    #[must_use]
    pub fn indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }

    /// Columns to drop (alter only).
    #[must_use]
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped_columns
    }

    /// Indexes to drop (alter only).
    #[must_use]
    pub fn dropped_indexes(&self) -> &[String] {
        &self.dropped_indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_helpers_set_types() {
        let mut table = Blueprint::create("samples");
        table.small_integer("a");
        table.big_integer("b");
        table.decimal("c", 10, 2);
        table.char("d", 2);
        table.timestamptz("e");
        table.jsonb("f");
        table.uuid("g");
        table.binary("h");

        let types: Vec<ColumnType> = table
            .columns()
            .iter()
            .map(ColumnDefinition::column_type)
            .collect();
        assert_eq!(
            types,
            vec![
                ColumnType::SmallInteger,
                ColumnType::BigInteger,
                ColumnType::Decimal {
                    precision: 10,
                    scale: 2
                },
                ColumnType::Char(2),
                ColumnType::TimestampTz,
                ColumnType::Jsonb,
                ColumnType::Uuid,
                ColumnType::Binary,
            ]
        );
        assert!(table.primary_keys().is_empty());
    }

    #[test]
    fn test_columns_are_not_null_by_default() {
        let mut table = Blueprint::create("users");
        table.string("email", 255);
        table.string("nickname", 50).nullable();

        assert!(!table.columns()[0].is_nullable());
        assert!(table.columns()[1].is_nullable());
    }

    #[test]
    fn test_increments_register_primary_key() {
        let mut table = Blueprint::create("users");
        table.big_increments("user_id");
        assert_eq!(table.primary_keys(), ["user_id"]);
    }

    #[test]
    fn test_explicit_primary_replaces_keys() {
        let mut table = Blueprint::create("memberships");
        table.integer("user_id");
        table.integer("team_id");
        table.primary(["user_id", "team_id"]);
        assert_eq!(table.primary_keys(), ["user_id", "team_id"]);
    }

    #[test]
    fn test_column_modifiers_chain() {
        let mut table = Blueprint::create("users");
        table.boolean("active").default(true).unique();
        let column = &table.columns()[0];
        assert!(column.is_unique());
        assert_eq!(column.default_value(), Some(&Parameter::Bool(true)));
    }

    #[test]
    fn test_timestamps_default_to_now() {
        let mut table = Blueprint::create("users");
        table.timestamps();
        let names: Vec<&str> = table.columns().iter().map(ColumnDefinition::name).collect();
        assert_eq!(names, ["created_at", "updated_at"]);
        assert!(matches!(
            table.columns()[0].default_value(),
            Some(Parameter::Expression(_))
        ));
    }

    #[test]
    fn test_foreign_key_defaults_to_id() {
        let mut table = Blueprint::create("posts");
        table.foreign("user_id").on("users");
        let foreign = &table.foreign_keys()[0];
        assert_eq!(foreign.referenced_columns(), ["id"]);
        assert_eq!(foreign.referenced_table(), Some("users"));
    }

    #[test]
    fn test_index_names() {
        let mut table = Blueprint::alter("users");
        table.index(["last_name", "first_name"]);
        table.unique_index(["email"]).name("users_email_key");

        assert_eq!(table.indexes()[0].index_name(), "users_last_name_first_name_index");
        assert_eq!(table.indexes()[1].index_name(), "users_email_key");
        assert!(table.indexes()[1].is_unique());
    }
}
