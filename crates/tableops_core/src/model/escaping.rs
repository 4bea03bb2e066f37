//! Identifier escaping per dialect.
//!
//! # Responsibility
//! - Derive which dialects quote an identifier and with which convention.
//! - Resolve table and field names once per engine instance.
//! - Rewrite canonical `"Field"` references inside caller filters.
//!
//! # Invariants
//! - A model without escape markers resolves every identifier to itself.
//! - Canonical form is always the ANSI-quoted identifier.

use crate::db::{DataConnection, Dialect};
use crate::model::descriptor::DescriptorTable;
use crate::model::table::EscapeMarker;
use regex::{NoExpand, RegexBuilder};
use std::collections::BTreeMap;

/// Dialects that quote an identifier, mapped to "use ANSI quotes".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeTargets {
    targets: BTreeMap<Dialect, bool>,
}

impl EscapeTargets {
    /// Returns `None` when no marker was declared.
    ///
    /// A marker without a dialect targets every dialect; those targets use
    /// ANSI quotes except for MySQL, unless a dialect-specific marker says
    /// otherwise.
    pub fn derive(markers: &[EscapeMarker]) -> Option<Self> {
        if markers.is_empty() {
            return None;
        }

        let all_dialects = markers.iter().any(|marker| marker.dialect.is_none());
        let dialects: Vec<Dialect> = if all_dialects {
            Dialect::ALL.to_vec()
        } else {
            markers.iter().filter_map(|marker| marker.dialect).collect()
        };

        let targets = dialects
            .into_iter()
            .map(|dialect| {
                let explicit = markers
                    .iter()
                    .find(|marker| marker.dialect == Some(dialect))
                    .is_some_and(|marker| marker.use_ansi_quotes);
                let use_ansi = explicit || (all_dialects && dialect != Dialect::MySql);
                (dialect, use_ansi)
            })
            .collect();

        Some(Self { targets })
    }

    pub fn is_targeted(&self, dialect: Dialect) -> bool {
        self.targets.contains_key(&dialect)
    }

    /// Whether ANSI quotes are used for `dialect`, if it is targeted.
    pub fn use_ansi_quotes(&self, dialect: Dialect) -> Option<bool> {
        self.targets.get(&dialect).copied()
    }

    /// Escapes `name` for the connection's dialect, or leaves it bare.
    pub fn escape(&self, name: &str, connection: &dyn DataConnection) -> String {
        match self.use_ansi_quotes(connection.dialect()) {
            Some(use_ansi) => connection.escape_identifier(name, use_ansi),
            None => name.to_string(),
        }
    }
}

/// Returns the canonical (ANSI-quoted) form of an identifier.
pub fn canonical_name(name: &str) -> String {
    format!("\"{name}\"")
}

/// Identifier names resolved for one connection.
#[derive(Debug, Clone)]
pub struct EscapingResolver {
    table_name: String,
    field_names: Vec<String>,
    /// Canonical form and connection form, only where the two differ.
    field_substitutions: Vec<(String, String)>,
}

impl EscapingResolver {
    pub fn resolve(table: &DescriptorTable, connection: &dyn DataConnection) -> Self {
        let table_name = match table.table_escape() {
            Some(targets) => targets.escape(table.table_name(), connection),
            None => table.table_name().to_string(),
        };

        if !table.has_escaped_fields() {
            return Self {
                table_name,
                field_names: table
                    .fields()
                    .iter()
                    .map(|field| field.field_name.clone())
                    .collect(),
                field_substitutions: Vec::new(),
            };
        }

        let mut field_names = Vec::with_capacity(table.fields().len());
        let mut field_substitutions = Vec::new();
        for field in table.fields() {
            match &field.escape_targets {
                Some(targets) => {
                    let derived = targets.escape(&field.field_name, connection);
                    let canonical = canonical_name(&field.field_name);
                    if derived != canonical {
                        field_substitutions.push((canonical, derived.clone()));
                    }
                    field_names.push(derived);
                }
                None => field_names.push(field.field_name.clone()),
            }
        }

        Self {
            table_name,
            field_names,
            field_substitutions,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Connection form of the field at `index`.
    pub fn field_name(&self, index: usize) -> &str {
        self.field_names
            .get(index)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// True when caller filters never need rewriting.
    pub fn is_passthrough(&self) -> bool {
        self.field_substitutions.is_empty()
    }

    /// Rewrites canonical field references in a caller filter.
    pub fn update_field_names(&self, filter_expression: &str, case_sensitive: bool) -> String {
        let mut expression = filter_expression.to_string();
        for (canonical, derived) in &self.field_substitutions {
            if case_sensitive {
                expression = expression.replace(canonical.as_str(), derived);
                continue;
            }

            match RegexBuilder::new(&regex::escape(canonical))
                .case_insensitive(true)
                .build()
            {
                Ok(pattern) => {
                    expression = pattern
                        .replace_all(&expression, NoExpand(derived))
                        .into_owned();
                }
                Err(_) => expression = expression.replace(canonical.as_str(), derived),
            }
        }
        expression
    }
}
