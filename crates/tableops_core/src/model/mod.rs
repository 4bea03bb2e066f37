//! Declarative record mapping and statement compilation.
//!
//! # Responsibility
//! - Describe record types through `TableModel` markers.
//! - Compile descriptors and statement plans once per record type.
//! - Compose parameterized restrictions.
//!
//! # Invariants
//! - Compiled state is immutable and shared read-only across instances.
//! - Everything connection-specific is resolved per engine instance, never
//!   stored back into the compiled model.

pub mod amendment;
pub mod compiled;
pub mod descriptor;
pub mod escaping;
pub mod record;
pub mod registry;
pub mod restriction;
pub mod table;
pub mod template;
pub mod value;

pub use amendment::{AmendmentSet, StatementKind};
pub use compiled::CompiledModel;
pub use descriptor::{DescriptorTable, FieldDescriptor};
pub use escaping::{EscapeTargets, EscapingResolver};
pub use record::{AnyRecord, Record};
pub use registry::ModelRegistry;
pub use restriction::{BooleanOperator, RecordRestriction, RestrictionError};
pub use table::{
    AffixPosition, AmendExpression, DataTypeMarker, EscapeMarker, FieldSpec, RootQueryRestriction,
    SearchType, StatementTypes, TableModel, TableOptions, TargetExpression,
};
pub use template::{ResolvedTemplate, StatementPlan, StatementPlans, TemplateSet};
pub use value::{FieldType, Value, ValueError, ValueKind};
