//! Attribute-driven relational mapping engine.
//!
//! Record types declare their table mapping once (`Record::table_model`);
//! `TableOperations` compiles that model into a dialect-aware statement
//! family and runs typed CRUD, counting, searching and key-cached paging
//! over any `DataConnection`.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use db::{
    open_db, open_db_in_memory, DataConnection, DataRow, DataType, DbError, DbResult, Dialect,
    NullConnection, Parameter, SqliteConnection,
};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget};
pub use model::{
    AffixPosition, AmendExpression, AnyRecord, BooleanOperator, CompiledModel, FieldSpec, FieldType,
    ModelRegistry, Record, RecordRestriction, RestrictionError, RootQueryRestriction, SearchType,
    StatementTypes, TableModel, TableOptions, TargetExpression, Value, ValueError, ValueKind,
};
pub use repo::{AnyTableOperations, KeyCache, ModelError, ModelResult, TableOperations};
pub use service::{ErrorHandler, RecoveringTableOperations};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
