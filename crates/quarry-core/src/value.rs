//! Parameter values and write payloads.
//!
//! Every value that ends up next to a placeholder is a [`Parameter`]. Values are
//! always bound positionally by the driver, never interpolated into SQL text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::expression::Expression;

/// A value that can appear in a query.
///
/// [`Parameter::Expression`] is the one variant that is never bound: grammars
/// splice its SQL into the statement text and bind its own bindings instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Timestamp value, always UTC.
    Date(DateTime<Utc>),
    /// Array of scalar values.
    Array(Vec<Parameter>),
    /// Raw SQL fragment, spliced rather than bound.
    Expression(Expression),
}

impl Parameter {
    /// Returns true for [`Parameter::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for [`Parameter::Expression`].
    #[must_use]
    pub const fn is_expression(&self) -> bool {
        matches!(self, Self::Expression(_))
    }

    /// Returns the integer value, converting from floats and numeric text.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) => Some(*f as i64),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the float value, converting from integers and numeric text.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(n) => Some(*n as f64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean value. Integers are true when non-zero.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(n) => Some(*n != 0),
            _ => None,
        }
    }

    /// Returns the timestamp value.
    #[must_use]
    pub const fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }
}

/// Trait for types that can be converted to a [`Parameter`].
pub trait ToParameter {
    /// Converts the value to a `Parameter`.
    fn to_parameter(self) -> Parameter;
}

impl ToParameter for Parameter {
    fn to_parameter(self) -> Parameter {
        self
    }
}

impl ToParameter for &Parameter {
    fn to_parameter(self) -> Parameter {
        self.clone()
    }
}

impl ToParameter for bool {
    fn to_parameter(self) -> Parameter {
        Parameter::Bool(self)
    }
}

macro_rules! int_to_parameter {
    ($($ty:ty),*) => {
        $(
            impl ToParameter for $ty {
                fn to_parameter(self) -> Parameter {
                    Parameter::Int(i64::from(self))
                }
            }
        )*
    };
}

int_to_parameter!(i8, i16, i32, i64, u8, u16, u32);

impl ToParameter for f64 {
    fn to_parameter(self) -> Parameter {
        Parameter::Float(self)
    }
}

impl ToParameter for f32 {
    fn to_parameter(self) -> Parameter {
        Parameter::Float(f64::from(self))
    }
}

impl ToParameter for String {
    fn to_parameter(self) -> Parameter {
        Parameter::Text(self)
    }
}

impl ToParameter for &str {
    fn to_parameter(self) -> Parameter {
        Parameter::Text(String::from(self))
    }
}

impl ToParameter for &String {
    fn to_parameter(self) -> Parameter {
        Parameter::Text(self.clone())
    }
}

impl ToParameter for DateTime<Utc> {
    fn to_parameter(self) -> Parameter {
        Parameter::Date(self)
    }
}

impl ToParameter for NaiveDateTime {
    fn to_parameter(self) -> Parameter {
        Parameter::Date(self.and_utc())
    }
}

impl ToParameter for NaiveDate {
    fn to_parameter(self) -> Parameter {
        Parameter::Date(self.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl ToParameter for Expression {
    fn to_parameter(self) -> Parameter {
        Parameter::Expression(self)
    }
}

impl<T: ToParameter> ToParameter for Option<T> {
    fn to_parameter(self) -> Parameter {
        match self {
            Some(v) => v.to_parameter(),
            None => Parameter::Null,
        }
    }
}

impl<T: ToParameter> ToParameter for Vec<T> {
    fn to_parameter(self) -> Parameter {
        Parameter::Array(self.into_iter().map(ToParameter::to_parameter).collect())
    }
}

impl<T: ToParameter + Clone> ToParameter for &[T] {
    fn to_parameter(self) -> Parameter {
        Parameter::Array(self.iter().cloned().map(ToParameter::to_parameter).collect())
    }
}

/// An ordered set of column values used for insert, update and upsert payloads.
///
/// Column order is insertion order and is the order columns are emitted in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Parameter)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets a column value, replacing an earlier value for the same column.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl ToParameter) -> Self {
        self.insert(column, value);
        self
    }

    /// Sets a column value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl ToParameter) {
        let column = column.into();
        let value = value.to_parameter();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Returns the value for a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Parameter> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Returns the column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Parameter)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Parameter)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}
