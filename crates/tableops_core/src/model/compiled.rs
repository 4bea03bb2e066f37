//! Per-type compiled model.
//!
//! # Responsibility
//! - Compile a `TableModel` once into descriptors, accessors and plans.
//! - Resolve templates and identifier names for a connection.
//!
//! # Invariants
//! - `accessors[i]` reads and writes the field described by
//!   `descriptors.fields()[i]`.
//! - Nothing in a compiled model changes after `compile` returns.

use crate::db::DataConnection;
use crate::model::amendment::AmendmentSet;
use crate::model::descriptor::DescriptorTable;
use crate::model::escaping::EscapingResolver;
use crate::model::table::{Getter, RootQueryRestriction, Setter, TableModel, ValueSource};
use crate::model::template::{canonical_statements, StatementPlans, TemplateSet};
use crate::model::value::{Value, ValueError};
use log::info;

pub(crate) struct FieldAccess<T> {
    pub(crate) get: Getter<T>,
    pub(crate) set: Setter<T>,
    pub(crate) default_value: Option<ValueSource>,
    pub(crate) update_value: Option<ValueSource>,
}

/// Everything derived from a record type's declarative model.
pub struct CompiledModel<T> {
    descriptors: DescriptorTable,
    accessors: Vec<FieldAccess<T>>,
    amendments: AmendmentSet,
    plans: StatementPlans,
    root_restriction: Option<RootQueryRestriction>,
    return_limit: Option<usize>,
    default_sort: Option<(String, bool)>,
}

impl<T> CompiledModel<T> {
    pub fn compile(model: TableModel<T>) -> Self {
        let descriptors = DescriptorTable::build(&model);
        let plans = StatementPlans::compile(&descriptors);
        let amendments = AmendmentSet::derive(&model.amendments);

        let TableModel {
            fields,
            root_restriction,
            return_limit,
            default_sort,
            ..
        } = model;
        let accessors = fields
            .into_iter()
            .filter(|spec| !spec.non_record)
            .map(|spec| FieldAccess {
                get: spec.getter,
                set: spec.setter,
                default_value: spec.default_value,
                update_value: spec.update_value,
            })
            .collect();

        info!(
            "event=model_compile module=model status=ok record_type={} table={} fields={} keys={} identity={}",
            descriptors.type_name(),
            descriptors.table_name(),
            descriptors.fields().len(),
            descriptors.primary_key_indices().len(),
            descriptors.has_identity_primary_key()
        );

        Self {
            descriptors,
            accessors,
            amendments,
            plans,
            root_restriction,
            return_limit,
            default_sort,
        }
    }

    pub fn descriptors(&self) -> &DescriptorTable {
        &self.descriptors
    }

    pub fn plans(&self) -> &StatementPlans {
        &self.plans
    }

    pub fn root_restriction(&self) -> Option<&RootQueryRestriction> {
        self.root_restriction.as_ref()
    }

    pub fn return_limit(&self) -> Option<usize> {
        self.return_limit
    }

    pub fn default_sort(&self) -> Option<(&str, bool)> {
        self.default_sort
            .as_ref()
            .map(|(field, ascending)| (field.as_str(), *ascending))
    }

    /// Resolves identifiers and statements for `connection`.
    pub fn resolve(
        &self,
        connection: &dyn DataConnection,
        custom_tokens: &[(String, String)],
    ) -> (EscapingResolver, TemplateSet) {
        let resolver = EscapingResolver::resolve(&self.descriptors, connection);
        let templates = TemplateSet::resolve(
            &self.plans,
            connection.dialect(),
            &resolver,
            &self.amendments,
            custom_tokens,
        );
        (resolver, templates)
    }

    /// Canonical statement texts, before any connection is involved.
    pub fn canonical_statements(&self) -> Vec<(&'static str, String)> {
        canonical_statements(&self.plans, &self.descriptors)
    }

    pub fn get_value(&self, record: &T, index: usize) -> Option<Value> {
        self.accessors.get(index).map(|access| (access.get)(record))
    }

    pub fn set_value(
        &self,
        record: &mut T,
        index: usize,
        value: Value,
    ) -> Option<Result<(), ValueError>> {
        self.accessors.get(index).map(|access| (access.set)(record, value))
    }

    pub(crate) fn accessors(&self) -> &[FieldAccess<T>] {
        &self.accessors
    }

    /// Values of `indices` read from `record`, in order.
    pub fn values(&self, record: &T, indices: &[usize]) -> Vec<Value> {
        indices
            .iter()
            .filter_map(|index| self.get_value(record, *index))
            .collect()
    }
}
