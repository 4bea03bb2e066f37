//! Engine error taxonomy.

use crate::db::DbError;
use crate::model::restriction::{value_list, RestrictionError};
use crate::model::value::{Value, ValueError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug)]
pub enum ModelError {
    /// A statement failed; carries the attempted SQL and its parameters.
    Db {
        operation: &'static str,
        record_type: String,
        sql: String,
        parameters: Vec<Value>,
        source: DbError,
    },
    /// A loaded column value did not fit the record field.
    FieldAssignment {
        record_type: String,
        field: String,
        value: Value,
        source: ValueError,
    },
    UnknownField {
        record_type: String,
        field: String,
    },
    Restriction(RestrictionError),
    MissingArgument(&'static str),
    InvalidArgument(String),
    /// Type-erased entry point received a record of another type.
    RecordTypeMismatch {
        operation: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    KeyCountMismatch {
        record_type: String,
        expected: usize,
        actual: usize,
    },
}

impl ModelError {
    pub(crate) fn db(
        operation: &'static str,
        record_type: &str,
        sql: impl Into<String>,
        parameters: Vec<Value>,
        source: DbError,
    ) -> Self {
        Self::Db {
            operation,
            record_type: record_type.to_string(),
            sql: sql.into(),
            parameters,
            source,
        }
    }

    /// Argument and type errors; never converted into a default result.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::MissingArgument(_)
                | Self::InvalidArgument(_)
                | Self::RecordTypeMismatch { .. }
                | Self::KeyCountMismatch { .. }
                | Self::UnknownField { .. }
                | Self::Restriction(_)
        )
    }

    /// SQL text of a failed statement, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Db { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db {
                operation,
                record_type,
                sql,
                parameters,
                source,
            } => write!(
                f,
                "exception during {operation} for {record_type} \"{sql}, {}\": {source}",
                value_list(parameters)
            ),
            Self::FieldAssignment {
                record_type,
                field,
                value,
                source,
            } => write!(
                f,
                "exception during record load field assignment for \"{record_type}.{field} = {value}\": {source}"
            ),
            Self::UnknownField { record_type, field } => {
                write!(f, "{record_type} has no field named `{field}`")
            }
            Self::Restriction(err) => write!(f, "{err}"),
            Self::MissingArgument(name) => write!(f, "missing required argument `{name}`"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::RecordTypeMismatch {
                operation,
                expected,
                actual,
            } => write!(
                f,
                "cannot {operation} record of type \"{actual}\", expected \"{expected}\""
            ),
            Self::KeyCountMismatch {
                record_type,
                expected,
                actual,
            } => write!(
                f,
                "{record_type} expects {expected} primary key value(s), got {actual}"
            ),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db { source, .. } => Some(source),
            Self::FieldAssignment { source, .. } => Some(source),
            Self::Restriction(err) => Some(err),
            Self::UnknownField { .. }
            | Self::MissingArgument(_)
            | Self::InvalidArgument(_)
            | Self::RecordTypeMismatch { .. }
            | Self::KeyCountMismatch { .. } => None,
        }
    }
}

impl From<RestrictionError> for ModelError {
    fn from(value: RestrictionError) -> Self {
        Self::Restriction(value)
    }
}
