//! Connection contract consumed by the mapping engine.

use super::dialect::{escape_identifier, Dialect};
use super::{DbError, DbResult};
use crate::model::value::Value;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Explicit parameter type requested by a field data type override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Integer,
    Real,
    Text,
    Blob,
    Guid,
}

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub value: Value,
    /// When set, the connection binds `value` as this type instead of
    /// inferring one from the value itself.
    pub data_type: Option<DataType>,
}

impl Parameter {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            data_type: None,
        }
    }

    pub fn typed(value: Value, data_type: DataType) -> Self {
        Self {
            value,
            data_type: Some(data_type),
        }
    }

    /// Returns the value converted to the requested data type, if any.
    pub fn coerced_value(&self) -> DbResult<Value> {
        let Some(data_type) = self.data_type else {
            return Ok(self.value.clone());
        };

        let value = &self.value;
        let converted = match (data_type, value) {
            (_, Value::Null) => Value::Null,
            (DataType::Boolean, Value::Bool(flag)) => Value::Bool(*flag),
            (DataType::Boolean, Value::Integer(number)) => Value::Bool(*number != 0),
            (DataType::Integer, Value::Integer(number)) => Value::Integer(*number),
            (DataType::Integer, Value::Bool(flag)) => Value::Integer(i64::from(*flag)),
            (DataType::Integer, Value::Text(text)) => {
                Value::Integer(text.trim().parse().map_err(|_| conversion_error(value, data_type))?)
            }
            (DataType::Real, Value::Real(number)) => Value::Real(*number),
            (DataType::Real, Value::Integer(number)) => Value::Real(*number as f64),
            (DataType::Real, Value::Text(text)) => {
                Value::Real(text.trim().parse().map_err(|_| conversion_error(value, data_type))?)
            }
            (DataType::Text | DataType::Guid, Value::Blob(_)) => {
                return Err(conversion_error(value, data_type));
            }
            (DataType::Text | DataType::Guid, other) => Value::Text(other.to_search_text()),
            (DataType::Blob, Value::Blob(bytes)) => Value::Blob(bytes.clone()),
            (DataType::Blob, Value::Text(text)) => Value::Blob(text.clone().into_bytes()),
            _ => return Err(conversion_error(value, data_type)),
        };

        Ok(converted)
    }
}

fn conversion_error(value: &Value, data_type: DataType) -> DbError {
    DbError::Conversion(format!(
        "{} value `{value}` cannot be bound as {data_type:?}",
        value.kind_name()
    ))
}

impl From<Value> for Parameter {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// One result row with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl DataRow {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Looks up a column value by name, ignoring ASCII case.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .and_then(|index| self.values.get(index))
    }
}

/// Minimal data access contract used by table operations.
///
/// Statements are composite-format strings: `{0}`, `{1}`, ... refer to
/// `parameters` by position.
pub trait DataConnection {
    fn dialect(&self) -> Dialect;

    fn execute_scalar(&self, sql: &str, parameters: &[Parameter]) -> DbResult<Value>;

    fn execute_non_query(&self, sql: &str, parameters: &[Parameter]) -> DbResult<usize>;

    fn retrieve_rows(&self, sql: &str, parameters: &[Parameter]) -> DbResult<Vec<DataRow>>;

    fn retrieve_row(&self, sql: &str, parameters: &[Parameter]) -> DbResult<Option<DataRow>> {
        Ok(self.retrieve_rows(sql, parameters)?.into_iter().next())
    }

    fn escape_identifier(&self, identifier: &str, use_ansi_quotes: bool) -> String {
        escape_identifier(identifier, self.dialect(), use_ansi_quotes)
    }
}

/// Connection that only reports a dialect.
///
/// Lets callers resolve a template set, or build blank records, without
/// a live database.
#[derive(Debug, Clone, Copy)]
pub struct NullConnection {
    dialect: Dialect,
}

impl NullConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl DataConnection for NullConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute_scalar(&self, _sql: &str, _parameters: &[Parameter]) -> DbResult<Value> {
        Err(DbError::NotConnected)
    }

    fn execute_non_query(&self, _sql: &str, _parameters: &[Parameter]) -> DbResult<usize> {
        Err(DbError::NotConnected)
    }

    fn retrieve_rows(&self, _sql: &str, _parameters: &[Parameter]) -> DbResult<Vec<DataRow>> {
        Err(DbError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::{DataRow, DataType, Parameter};
    use crate::model::value::Value;
    use std::sync::Arc;

    #[test]
    fn row_lookup_ignores_case() {
        let row = DataRow::new(
            Arc::from(vec!["ID".to_string(), "Name".to_string()]),
            vec![Value::Integer(1), Value::from("widget")],
        );
        assert_eq!(row.get("name"), Some(&Value::from("widget")));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn typed_parameter_coerces_to_requested_type() {
        let text = Parameter::typed(Value::Integer(12), DataType::Text);
        assert_eq!(text.coerced_value().unwrap(), Value::from("12"));

        let integer = Parameter::typed(Value::from("7"), DataType::Integer);
        assert_eq!(integer.coerced_value().unwrap(), Value::Integer(7));

        let null = Parameter::typed(Value::Null, DataType::Guid);
        assert_eq!(null.coerced_value().unwrap(), Value::Null);
    }

    #[test]
    fn impossible_coercion_is_an_error() {
        let parameter = Parameter::typed(Value::Blob(vec![1, 2]), DataType::Integer);
        assert!(parameter.coerced_value().is_err());
    }
}
