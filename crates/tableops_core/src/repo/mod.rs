//! Record persistence through compiled table models.
//!
//! # Responsibility
//! - Execute the statement family of a record type against a connection.
//! - Page large result sets through a cached primary key list.
//! - Expose the same surface type-erased for heterogeneous callers.
//!
//! # Invariants
//! - Failed statements surface as `ModelError::Db` carrying the SQL and
//!   parameter values that were attempted.
//! - Argument errors are raised before any statement runs.

pub mod any_table;
pub mod error;
pub mod key_cache;
pub mod table_operations;

pub use any_table::AnyTableOperations;
pub use error::{ModelError, ModelResult};
pub use key_cache::{page_bounds, KeyCache, KeyCachePager};
pub use table_operations::TableOperations;
