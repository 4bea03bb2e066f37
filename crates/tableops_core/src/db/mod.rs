//! Database collaborator contract and the SQLite implementation.
//!
//! # Responsibility
//! - Define the minimal data access contract the mapping engine consumes.
//! - Resolve dialect-specific identifier escaping.
//! - Provide a rusqlite-backed connection for embedded use and tests.
//!
//! # Invariants
//! - SQL handed to a connection uses `{N}` positional placeholders; each
//!   implementation rewrites them into its native parameter syntax.
//! - Connections never interpret the statement text beyond placeholders.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod connection;
mod dialect;
mod sqlite;

pub use connection::{DataConnection, DataRow, DataType, NullConnection, Parameter};
pub use dialect::{escape_identifier, Dialect};
pub use sqlite::{open_db, open_db_in_memory, SqliteConnection};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Placeholder references a parameter that was not supplied.
    MissingParameter {
        index: usize,
        supplied: usize,
    },
    /// Connection cannot execute statements (template-only connection).
    NotConnected,
    Conversion(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::MissingParameter { index, supplied } => write!(
                f,
                "statement references parameter {{{index}}} but only {supplied} supplied"
            ),
            Self::NotConnected => write!(f, "connection does not execute statements"),
            Self::Conversion(message) => write!(f, "value conversion failed: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::MissingParameter { .. } => None,
            Self::NotConnected => None,
            Self::Conversion(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
