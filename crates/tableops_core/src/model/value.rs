//! Dynamic field values exchanged with the connection collaborator.
//!
//! # Responsibility
//! - Define the dialect-neutral value shape bound to and read from SQL.
//! - Convert between typed record fields and dynamic values.
//!
//! # Invariants
//! - `Value::Null` converts to the field type's default for non-optional
//!   fields, mirroring how a blank row loads into a blank record.
//! - Conversions never panic; mismatches surface as `ValueError`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Dynamic value bound as a statement parameter or read from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Returns whether the value equals its type's default.
    ///
    /// Used to decide between insert and update, and to detect blank rows
    /// for identity-keyed models.
    pub fn is_default(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(value) => !value,
            Self::Integer(value) => *value == 0,
            Self::Real(value) => *value == 0.0,
            Self::Text(value) => {
                value.is_empty() || value.parse::<Uuid>().is_ok_and(|id| id.is_nil())
            }
            Self::Blob(value) => value.is_empty(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the short kind label used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    /// Renders the value as plain text for in-memory search matching.
    pub fn to_search_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(value) => value.clone(),
            other => other.to_string(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
            Self::Blob(value) => write!(f, "<{} bytes>", value.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Text(value.to_string())
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Logical kind of a mapped field.
///
/// Text fields default to substring search; every other kind defaults to
/// exact matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Integer,
    Real,
    Text,
    Blob,
    Uuid,
}

/// Value could not be converted into the target field type.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueError {
    pub expected: ValueKind,
    pub found: Value,
}

impl ValueError {
    fn new(expected: ValueKind, found: Value) -> Self {
        Self { expected, found }
    }
}

impl Display for ValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot convert {} value `{}` to {:?}",
            self.found.kind_name(),
            self.found,
            self.expected
        )
    }
}

impl Error for ValueError {}

/// Rust field types that can be mapped to a column.
pub trait FieldType: Sized + 'static {
    const KIND: ValueKind;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, ValueError>;

    fn is_default(&self) -> bool {
        self.to_value().is_default()
    }
}

impl FieldType for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(value) => Ok(value),
            Value::Integer(value) => Ok(value != 0),
            Value::Text(ref text) => match text.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                _ => Err(ValueError::new(Self::KIND, value)),
            },
            other => Err(ValueError::new(Self::KIND, other)),
        }
    }
}

impl FieldType for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(0),
            Value::Integer(value) => Ok(value),
            Value::Bool(value) => Ok(i64::from(value)),
            Value::Real(real) if real.fract() == 0.0 => Ok(real as i64),
            Value::Text(ref text) => text
                .trim()
                .parse()
                .map_err(|_| ValueError::new(Self::KIND, value.clone())),
            other => Err(ValueError::new(Self::KIND, other)),
        }
    }
}

impl FieldType for i32 {
    const KIND: ValueKind = ValueKind::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        let wide = i64::from_value(value.clone())?;
        i32::try_from(wide).map_err(|_| ValueError::new(Self::KIND, value))
    }
}

impl FieldType for f64 {
    const KIND: ValueKind = ValueKind::Real;

    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(0.0),
            Value::Real(value) => Ok(value),
            Value::Integer(value) => Ok(value as f64),
            Value::Text(ref text) => text
                .trim()
                .parse()
                .map_err(|_| ValueError::new(Self::KIND, value.clone())),
            other => Err(ValueError::new(Self::KIND, other)),
        }
    }
}

impl FieldType for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Text(value) => Ok(value),
            Value::Integer(value) => Ok(value.to_string()),
            Value::Real(value) => Ok(value.to_string()),
            Value::Bool(value) => Ok(value.to_string()),
            Value::Blob(bytes) => String::from_utf8(bytes)
                .map_err(|err| ValueError::new(Self::KIND, Value::Blob(err.into_bytes()))),
        }
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }
}

impl FieldType for Vec<u8> {
    const KIND: ValueKind = ValueKind::Blob;

    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Blob(value) => Ok(value),
            Value::Text(value) => Ok(value.into_bytes()),
            other => Err(ValueError::new(Self::KIND, other)),
        }
    }
}

impl FieldType for Uuid {
    const KIND: ValueKind = ValueKind::Uuid;

    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(Uuid::nil()),
            Value::Text(ref text) => {
                Uuid::parse_str(text.trim()).map_err(|_| ValueError::new(Self::KIND, value.clone()))
            }
            Value::Blob(ref bytes) => {
                Uuid::from_slice(bytes).map_err(|_| ValueError::new(Self::KIND, value.clone()))
            }
            other => Err(ValueError::new(Self::KIND, other)),
        }
    }

    fn is_default(&self) -> bool {
        self.is_nil()
    }
}

impl<V: FieldType> FieldType for Option<V> {
    const KIND: ValueKind = V::KIND;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldType::to_value)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => V::from_value(other).map(Some),
        }
    }

    fn is_default(&self) -> bool {
        self.is_none()
    }
}
