//! Parameterized record restrictions and their composition.
//!
//! # Responsibility
//! - Hold a filter expression (no `WHERE` keyword) with positional values.
//! - Combine restrictions with AND/OR while keeping placeholders unique.
//!
//! # Invariants
//! - Every `{N}` in the expression satisfies `N < parameters.len()`.
//! - Composition never mutates either operand; the right operand is
//!   renumbered on a copy.

use crate::model::value::Value;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::{BitAnd, BitOr};

/// Matches one positional placeholder, capturing its index.
pub(crate) static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\d+)\}").expect("valid placeholder regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestrictionError {
    /// Both composition operands were absent.
    MissingOperands,
    PlaceholderOutOfRange {
        index: usize,
        parameter_count: usize,
    },
}

impl Display for RestrictionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOperands => {
                write!(f, "cannot combine restrictions when both operands are absent")
            }
            Self::PlaceholderOutOfRange {
                index,
                parameter_count,
            } => write!(
                f,
                "placeholder {{{index}}} is out of range for {parameter_count} parameter(s)"
            ),
        }
    }
}

impl Error for RestrictionError {}

/// Boolean operator joining two restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
}

impl BooleanOperator {
    fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Filter expression plus the values its placeholders refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RestrictionParts")]
pub struct RecordRestriction {
    filter_expression: String,
    parameters: Vec<Value>,
}

/// Serialized form; deserialization goes through `RecordRestriction::new`.
#[derive(Deserialize)]
struct RestrictionParts {
    filter_expression: String,
    parameters: Vec<Value>,
}

impl TryFrom<RestrictionParts> for RecordRestriction {
    type Error = RestrictionError;

    fn try_from(parts: RestrictionParts) -> Result<Self, Self::Error> {
        Self::new(parts.filter_expression, parts.parameters)
    }
}

impl RecordRestriction {
    /// Creates a restriction, rejecting placeholders without a value.
    pub fn new(
        filter_expression: impl Into<String>,
        parameters: Vec<Value>,
    ) -> Result<Self, RestrictionError> {
        let filter_expression = filter_expression.into();
        if let Some(index) = max_placeholder_index(&filter_expression) {
            if index >= parameters.len() {
                return Err(RestrictionError::PlaceholderOutOfRange {
                    index,
                    parameter_count: parameters.len(),
                });
            }
        }

        Ok(Self {
            filter_expression,
            parameters,
        })
    }

    /// Builds a restriction whose placeholders are known to be in range.
    pub(crate) fn from_parts(filter_expression: String, parameters: Vec<Value>) -> Self {
        Self {
            filter_expression,
            parameters,
        }
    }

    /// Creates a restriction with no parameters.
    pub fn expression(filter_expression: impl Into<String>) -> Result<Self, RestrictionError> {
        Self::new(filter_expression, Vec::new())
    }

    pub fn filter_expression(&self) -> &str {
        &self.filter_expression
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.filter_expression, self.parameters)
    }

    /// Returns the expression with every placeholder shifted by `offset`.
    pub fn offset_expression(&self, offset: usize) -> String {
        renumber_placeholders(&self.filter_expression, offset)
    }

    /// Combines `left` and `right` with `operator`.
    ///
    /// An absent side yields a copy of the other side; both absent is a
    /// caller error.
    pub fn combine(
        left: Option<&Self>,
        right: Option<&Self>,
        operator: BooleanOperator,
    ) -> Result<Self, RestrictionError> {
        match (left, right) {
            (None, None) => Err(RestrictionError::MissingOperands),
            (Some(left), None) => Ok(left.clone()),
            (None, Some(right)) => Ok(right.clone()),
            (Some(left), Some(right)) => Ok(left.join(right, operator)),
        }
    }

    pub fn and(&self, other: &Self) -> Self {
        self.join(other, BooleanOperator::And)
    }

    pub fn or(&self, other: &Self) -> Self {
        self.join(other, BooleanOperator::Or)
    }

    fn join(&self, other: &Self, operator: BooleanOperator) -> Self {
        let right_expression = other.offset_expression(self.parameters.len());
        let mut parameters = Vec::with_capacity(self.parameters.len() + other.parameters.len());
        parameters.extend_from_slice(&self.parameters);
        parameters.extend_from_slice(&other.parameters);

        Self {
            filter_expression: format!(
                "({}) {} ({})",
                self.filter_expression,
                operator.keyword(),
                right_expression
            ),
            parameters,
        }
    }
}

impl Display for RecordRestriction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filter_expression)?;
        if !self.parameters.is_empty() {
            write!(f, " [{}]", value_list(&self.parameters))?;
        }
        Ok(())
    }
}

impl BitAnd for &RecordRestriction {
    type Output = RecordRestriction;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl BitOr for &RecordRestriction {
    type Output = RecordRestriction;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

/// Shifts every `{N}` placeholder in `expression` to `{N + offset}`.
///
/// Replacement is a single left-to-right pass, so `{1}` and `{10}` can
/// never be confused with each other.
pub fn renumber_placeholders(expression: &str, offset: usize) -> String {
    if offset == 0 {
        return expression.to_string();
    }

    PLACEHOLDER_RE
        .replace_all(expression, |caps: &Captures<'_>| match caps[1].parse::<usize>() {
            Ok(index) => format!("{{{}}}", index + offset),
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

/// Returns the highest placeholder index referenced by `expression`.
pub fn max_placeholder_index(expression: &str) -> Option<usize> {
    PLACEHOLDER_RE
        .captures_iter(expression)
        .filter_map(|caps| caps[1].parse::<usize>().ok())
        .max()
}

/// Formats values as `0:a, 1:b` for diagnostics.
pub fn value_list(values: &[Value]) -> String {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| format!("{index}:{value}"))
        .collect::<Vec<_>>()
        .join(", ")
}
