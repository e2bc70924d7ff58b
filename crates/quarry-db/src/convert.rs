//! Conversions shared by the drivers.

use quarry_core::Parameter;
use serde_json::{Number, Value};

use crate::error::{DbError, Result};

/// Converts a parameter into JSON, for drivers without native arrays.
pub(crate) fn to_json(value: &Parameter) -> Result<Value> {
    Ok(match value {
        Parameter::Null => Value::Null,
        Parameter::Bool(value) => Value::Bool(*value),
        Parameter::Int(value) => Value::Number((*value).into()),
        Parameter::Float(value) => Number::from_f64(*value)
            .map(Value::Number)
            .ok_or_else(|| DbError::UnsupportedBinding(format!("non-finite float {value}")))?,
        Parameter::Text(value) => Value::String(value.clone()),
        Parameter::Date(value) => Value::String(value.to_rfc3339()),
        Parameter::Array(values) => Value::Array(values.iter().map(to_json).collect::<Result<_>>()?),
        Parameter::Expression(expr) => return Err(unbindable_expression(expr.sql())),
    })
}

/// Encodes a list as JSON text.
pub(crate) fn array_to_json(values: &[Parameter]) -> Result<String> {
    let array = Value::Array(values.iter().map(to_json).collect::<Result<_>>()?);
    Ok(array.to_string())
}

/// The error for an expression that reached the driver unspliced.
pub(crate) fn unbindable_expression(sql: &str) -> DbError {
    DbError::UnsupportedBinding(format!("raw expression `{sql}` as a value"))
}

/// Decodes binary column data as UTF-8 text.
pub(crate) fn bytes_to_text(column: &str, type_name: &str, bytes: Vec<u8>) -> Result<Parameter> {
    String::from_utf8(bytes)
        .map(Parameter::Text)
        .map_err(|_| DbError::UnsupportedColumnType {
            column: column.to_string(),
            type_name: type_name.to_string(),
        })
}
