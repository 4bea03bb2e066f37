//! Field descriptor builder.
//!
//! # Responsibility
//! - Turn a `TableModel` into an ordered, immutable descriptor table.
//! - Derive key, insert, update and search field sets.
//!
//! # Invariants
//! - Descriptor order equals declaration order minus non-record fields.
//! - With no declared primary key, every field acts as a key field.
//! - Identity key fields never appear in the insert set.

use crate::db::{DataType, Dialect};
use crate::model::escaping::{canonical_name, EscapeTargets};
use crate::model::table::{DataTypeMarker, SearchType, TableModel};
use crate::model::value::ValueKind;
use std::collections::BTreeMap;

/// Compiled mapping of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Member name in the record type.
    pub property_name: String,
    /// Column name in the table.
    pub field_name: String,
    pub kind: ValueKind,
    pub is_primary_key: bool,
    pub is_identity: bool,
    pub search: Option<SearchType>,
    pub data_types: Option<BTreeMap<Dialect, DataType>>,
    pub escape_targets: Option<EscapeTargets>,
}

impl FieldDescriptor {
    /// Explicit bind type for `dialect`, if one was declared.
    pub fn data_type_for(&self, dialect: Dialect) -> Option<DataType> {
        self.data_types
            .as_ref()
            .and_then(|targets| targets.get(&dialect).copied())
    }

    /// Match mode with `Default` resolved by field kind.
    pub fn effective_search_type(&self) -> Option<SearchType> {
        self.search.map(|search| match search {
            SearchType::Default if self.kind == ValueKind::Text => SearchType::LikeExpression,
            SearchType::Default => SearchType::FullValueMatch,
            other => other,
        })
    }

    /// Name as it appears in compiled templates before connection resolution.
    pub fn canonical_name(&self) -> String {
        if self.escape_targets.is_some() {
            canonical_name(&self.field_name)
        } else {
            self.field_name.clone()
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.trim();
        self.field_name.eq_ignore_ascii_case(name) || self.property_name.eq_ignore_ascii_case(name)
    }
}

/// Ordered descriptors of one record type plus derived field sets.
#[derive(Debug, Clone)]
pub struct DescriptorTable {
    type_name: String,
    table_name: String,
    table_escape: Option<EscapeTargets>,
    fields: Vec<FieldDescriptor>,
    primary_key: Vec<usize>,
    declared_primary_key: bool,
    identity_primary_key: bool,
    insert_fields: Vec<usize>,
    update_fields: Vec<usize>,
    searchable_fields: Vec<usize>,
}

impl DescriptorTable {
    pub fn build<T>(model: &TableModel<T>) -> Self {
        let base_name = model
            .table_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(model.type_name.as_str());
        let table_name = match model.table_name_prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}{base_name}"),
            _ => base_name.to_string(),
        };

        let fields: Vec<FieldDescriptor> = model
            .fields
            .iter()
            .filter(|spec| !spec.non_record)
            .map(|spec| FieldDescriptor {
                property_name: spec.property_name.clone(),
                field_name: spec
                    .field_name
                    .as_deref()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or(spec.property_name.as_str())
                    .to_string(),
                kind: spec.kind,
                is_primary_key: spec.primary_key.is_some(),
                is_identity: spec.primary_key.unwrap_or(false),
                search: spec.search,
                data_types: derive_data_types(&spec.data_types),
                escape_targets: EscapeTargets::derive(&spec.escapes),
            })
            .collect();

        let declared: Vec<usize> = indices(&fields, |field| field.is_primary_key);
        let declared_primary_key = !declared.is_empty();
        let primary_key = if declared_primary_key {
            declared
        } else {
            (0..fields.len()).collect()
        };

        Self {
            type_name: model.type_name.clone(),
            table_name,
            table_escape: EscapeTargets::derive(&model.escapes),
            identity_primary_key: fields.iter().any(|field| field.is_identity),
            insert_fields: indices(&fields, |field| !field.is_identity),
            update_fields: indices(&fields, |field| !field.is_primary_key),
            searchable_fields: indices(&fields, |field| field.search.is_some()),
            primary_key,
            declared_primary_key,
            fields,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Unescaped table name, prefix included.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Table name as written into compiled templates.
    pub fn canonical_table_name(&self) -> String {
        if self.table_escape.is_some() {
            canonical_name(&self.table_name)
        } else {
            self.table_name.clone()
        }
    }

    pub fn table_escape(&self) -> Option<&EscapeTargets> {
        self.table_escape.as_ref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Finds a field by column or member name, ignoring case.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.matches_name(name))
    }

    /// Key fields used for row restrictions.
    pub fn primary_key_indices(&self) -> &[usize] {
        &self.primary_key
    }

    pub fn has_any_primary_key(&self) -> bool {
        self.declared_primary_key
    }

    pub fn has_identity_primary_key(&self) -> bool {
        self.identity_primary_key
    }

    pub fn insert_indices(&self) -> &[usize] {
        &self.insert_fields
    }

    pub fn update_indices(&self) -> &[usize] {
        &self.update_fields
    }

    pub fn searchable_indices(&self) -> &[usize] {
        &self.searchable_fields
    }

    pub fn has_escaped_fields(&self) -> bool {
        self.fields.iter().any(|field| field.escape_targets.is_some())
    }
}

fn indices(fields: &[FieldDescriptor], predicate: impl Fn(&FieldDescriptor) -> bool) -> Vec<usize> {
    fields
        .iter()
        .enumerate()
        .filter(|(_, field)| predicate(field))
        .map(|(index, _)| index)
        .collect()
}

/// Per-dialect bind types; an untargeted marker fills every dialect that
/// has no marker of its own.
fn derive_data_types(markers: &[DataTypeMarker]) -> Option<BTreeMap<Dialect, DataType>> {
    if markers.is_empty() {
        return None;
    }

    let fallback = markers
        .iter()
        .find(|marker| marker.dialect.is_none())
        .map(|marker| marker.data_type);
    let dialects: Vec<Dialect> = if fallback.is_some() {
        Dialect::ALL.to_vec()
    } else {
        markers.iter().filter_map(|marker| marker.dialect).collect()
    };

    let mut targets = BTreeMap::new();
    for dialect in dialects {
        let data_type = markers
            .iter()
            .find(|marker| marker.dialect == Some(dialect))
            .map(|marker| marker.data_type)
            .or(fallback);
        if let Some(data_type) = data_type {
            targets.insert(dialect, data_type);
        }
    }
    Some(targets)
}
