//! Declarative table and field markers.
//!
//! # Responsibility
//! - Describe how a record type maps to a table, field by field.
//! - Carry per-dialect escaping, data type and amendment requests.
//!
//! # Invariants
//! - Markers are plain data; nothing here touches a connection.
//! - Field accessors are type-erased once so descriptors stay non-generic.

use crate::db::{DataType, Dialect};
use crate::model::restriction::RecordRestriction;
use crate::model::value::{FieldType, Value, ValueError, ValueKind};
use std::fmt::{Debug, Formatter};
use std::ops::BitOr;
use std::sync::Arc;

/// How a searchable field matches search terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchType {
    /// Substring for text fields, exact match for everything else.
    #[default]
    Default,
    LikeExpression,
    FullValueMatch,
}

/// Expression an amendment attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetExpression {
    TableName,
    FieldList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffixPosition {
    Prefix,
    Suffix,
}

/// Set of statement categories an amendment is scoped to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatementTypes(u8);

impl StatementTypes {
    pub const NONE: Self = Self(0);
    pub const SELECT_COUNT: Self = Self(1);
    /// Multi-row selects, including the key-only selects used for paging.
    pub const SELECT_SET: Self = Self(1 << 1);
    pub const SELECT_ROW: Self = Self(1 << 2);
    pub const INSERT: Self = Self(1 << 3);
    pub const UPDATE: Self = Self(1 << 4);
    pub const DELETE: Self = Self(1 << 5);
    pub const ALL: Self = Self(0b11_1111);

    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for StatementTypes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl Debug for StatementTypes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(StatementTypes, &str); 6] = [
            (StatementTypes::SELECT_COUNT, "SELECT_COUNT"),
            (StatementTypes::SELECT_SET, "SELECT_SET"),
            (StatementTypes::SELECT_ROW, "SELECT_ROW"),
            (StatementTypes::INSERT, "INSERT"),
            (StatementTypes::UPDATE, "UPDATE"),
            (StatementTypes::DELETE, "DELETE"),
        ];

        let names = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>();
        if names.is_empty() {
            return f.write_str("NONE");
        }
        f.write_str(&names.join(" | "))
    }
}

/// Text inserted before or after the table name or field list.
///
/// `{token}` style text may be filled in per instance through custom
/// runtime tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmendExpression {
    pub text: String,
    /// `None` targets every dialect.
    pub dialect: Option<Dialect>,
    pub target: TargetExpression,
    pub statements: StatementTypes,
    pub position: AffixPosition,
}

impl AmendExpression {
    /// Creates a table name prefix amendment for every dialect and statement.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            dialect: None,
            target: TargetExpression::TableName,
            statements: StatementTypes::ALL,
            position: AffixPosition::Prefix,
        }
    }

    pub fn for_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn target(mut self, target: TargetExpression) -> Self {
        self.target = target;
        self
    }

    pub fn statements(mut self, statements: StatementTypes) -> Self {
        self.statements = statements;
        self
    }

    pub fn position(mut self, position: AffixPosition) -> Self {
        self.position = position;
        self
    }
}

/// Request to quote an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapeMarker {
    /// `None` targets every dialect.
    pub dialect: Option<Dialect>,
    pub use_ansi_quotes: bool,
}

/// Explicit bind type for a field's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTypeMarker {
    /// `None` applies to every dialect without its own marker.
    pub dialect: Option<Dialect>,
    pub data_type: DataType,
}

/// Fixed filter ANDed into every query of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct RootQueryRestriction {
    pub restriction: RecordRestriction,
    pub apply_to_updates: bool,
    pub apply_to_deletes: bool,
}

impl RootQueryRestriction {
    /// Applies to queries, updates and deletes.
    pub fn new(restriction: RecordRestriction) -> Self {
        Self {
            restriction,
            apply_to_updates: true,
            apply_to_deletes: true,
        }
    }

    pub fn apply_to_updates(mut self, apply: bool) -> Self {
        self.apply_to_updates = apply;
        self
    }

    pub fn apply_to_deletes(mut self, apply: bool) -> Self {
        self.apply_to_deletes = apply;
        self
    }
}

pub(crate) type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
pub(crate) type Setter<T> = Arc<dyn Fn(&mut T, Value) -> Result<(), ValueError> + Send + Sync>;
pub(crate) type ValueSource = Arc<dyn Fn() -> Value + Send + Sync>;

/// Mapping of one record member to a column.
pub struct FieldSpec<T> {
    pub(crate) property_name: String,
    pub(crate) field_name: Option<String>,
    pub(crate) kind: ValueKind,
    pub(crate) getter: Getter<T>,
    pub(crate) setter: Setter<T>,
    pub(crate) primary_key: Option<bool>,
    pub(crate) search: Option<SearchType>,
    pub(crate) data_types: Vec<DataTypeMarker>,
    pub(crate) escapes: Vec<EscapeMarker>,
    pub(crate) non_record: bool,
    pub(crate) default_value: Option<ValueSource>,
    pub(crate) update_value: Option<ValueSource>,
}

impl<T: 'static> FieldSpec<T> {
    /// Maps the member reached through `get`/`get_mut` under `property_name`.
    ///
    /// The column name defaults to `property_name`.
    pub fn new<V, G, M>(property_name: impl Into<String>, get: G, get_mut: M) -> Self
    where
        V: FieldType,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        Self {
            property_name: property_name.into(),
            field_name: None,
            kind: V::KIND,
            getter: Arc::new(move |record: &T| get(record).to_value()),
            setter: Arc::new(move |record: &mut T, value: Value| {
                *get_mut(record) = V::from_value(value)?;
                Ok(())
            }),
            primary_key: None,
            search: None,
            data_types: Vec::new(),
            escapes: Vec::new(),
            non_record: false,
            default_value: None,
            update_value: None,
        }
    }

    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Marks the field as (part of) the primary key.
    ///
    /// Identity keys are generated by the database and never inserted.
    pub fn primary_key(mut self, is_identity: bool) -> Self {
        self.primary_key = Some(is_identity);
        self
    }

    pub fn searchable(mut self, search_type: SearchType) -> Self {
        self.search = Some(search_type);
        self
    }

    pub fn field_data_type(mut self, dialect: Option<Dialect>, data_type: DataType) -> Self {
        self.data_types.push(DataTypeMarker { dialect, data_type });
        self
    }

    pub fn use_escaped_name(mut self, dialect: Option<Dialect>, use_ansi_quotes: bool) -> Self {
        self.escapes.push(EscapeMarker {
            dialect,
            use_ansi_quotes,
        });
        self
    }

    /// Excludes the member from every generated statement.
    pub fn non_record_field(mut self) -> Self {
        self.non_record = true;
        self
    }

    pub fn default_value(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.default_with(move || value.clone())
    }

    /// Evaluates `source` whenever a blank record is created.
    pub fn default_with(mut self, source: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default_value = Some(Arc::new(source));
        self
    }

    /// Evaluates `source` before every update of the record.
    pub fn update_with(mut self, source: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.update_value = Some(Arc::new(source));
        self
    }
}

impl<T> Debug for FieldSpec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSpec")
            .field("property_name", &self.property_name)
            .field("field_name", &self.field_name)
            .field("kind", &self.kind)
            .field("primary_key", &self.primary_key)
            .field("search", &self.search)
            .field("non_record", &self.non_record)
            .finish_non_exhaustive()
    }
}

/// Table-level mapping for record type `T`.
pub struct TableModel<T> {
    pub(crate) type_name: String,
    pub(crate) table_name: Option<String>,
    pub(crate) table_name_prefix: Option<String>,
    pub(crate) escapes: Vec<EscapeMarker>,
    pub(crate) amendments: Vec<AmendExpression>,
    pub(crate) root_restriction: Option<RootQueryRestriction>,
    pub(crate) return_limit: Option<usize>,
    pub(crate) default_sort: Option<(String, bool)>,
    pub(crate) fields: Vec<FieldSpec<T>>,
}

impl<T: 'static> TableModel<T> {
    /// Starts a model whose table name is the short type name of `T`.
    pub fn new() -> Self {
        Self {
            type_name: short_type_name::<T>().to_string(),
            table_name: None,
            table_name_prefix: None,
            escapes: Vec::new(),
            amendments: Vec::new(),
            root_restriction: None,
            return_limit: None,
            default_sort: None,
            fields: Vec::new(),
        }
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Prepends a configured prefix to the table name.
    pub fn table_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_name_prefix = Some(prefix.into());
        self
    }

    pub fn use_escaped_name(mut self, dialect: Option<Dialect>, use_ansi_quotes: bool) -> Self {
        self.escapes.push(EscapeMarker {
            dialect,
            use_ansi_quotes,
        });
        self
    }

    pub fn amend_expression(mut self, amendment: AmendExpression) -> Self {
        self.amendments.push(amendment);
        self
    }

    pub fn root_query_restriction(mut self, root: RootQueryRestriction) -> Self {
        self.root_restriction = Some(root);
        self
    }

    /// Default row limit for unpaged multi-row queries.
    pub fn return_limit(mut self, limit: usize) -> Self {
        self.return_limit = Some(limit);
        self
    }

    /// Default order-by field used when a query names none.
    pub fn default_sort(mut self, field_name: impl Into<String>, ascending: bool) -> Self {
        self.default_sort = Some((field_name.into(), ascending));
        self
    }

    pub fn field(mut self, field: FieldSpec<T>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl<T: 'static> Default for TableModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for TableModel<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableModel")
            .field("type_name", &self.type_name)
            .field("table_name", &self.table_name)
            .field("table_name_prefix", &self.table_name_prefix)
            .field("escapes", &self.escapes)
            .field("amendments", &self.amendments)
            .field("root_restriction", &self.root_restriction)
            .field("return_limit", &self.return_limit)
            .field("default_sort", &self.default_sort)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Per-instance options of table operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOptions {
    /// Text replacements applied to resolved statements after amendments,
    /// e.g. `("{count}", "10")`.
    pub custom_tokens: Vec<(String, String)>,
    /// Match canonical `"Field"` references in caller filters exactly
    /// instead of ignoring case.
    pub use_case_sensitive_field_names: bool,
}

impl TableOptions {
    pub fn custom_token(
        mut self,
        token: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        self.custom_tokens.push((token.into(), replacement.into()));
        self
    }

    pub fn case_sensitive_field_names(mut self, case_sensitive: bool) -> Self {
        self.use_case_sensitive_field_names = case_sensitive;
        self
    }
}

/// Last path segment of `T`'s type name, without generic arguments.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::{short_type_name, FieldSpec, StatementTypes, TableModel};
    use crate::model::value::Value;

    #[derive(Default)]
    struct Gadget {
        id: i64,
        label: String,
    }

    #[test]
    fn statement_types_combine_and_contain() {
        let scoped = StatementTypes::SELECT_SET | StatementTypes::SELECT_ROW;
        assert!(scoped.contains(StatementTypes::SELECT_ROW));
        assert!(!scoped.contains(StatementTypes::INSERT));
        assert!(StatementTypes::ALL.contains(StatementTypes::DELETE));
        assert!(!StatementTypes::ALL.contains(StatementTypes::NONE));
        assert_eq!(format!("{scoped:?}"), "SELECT_SET | SELECT_ROW");
    }

    #[test]
    fn model_defaults_to_short_type_name() {
        let model = TableModel::<Gadget>::new();
        assert_eq!(model.type_name(), "Gadget");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn field_accessors_read_and_write_through_values() {
        let id = FieldSpec::new("ID", |g: &Gadget| &g.id, |g: &mut Gadget| &mut g.id);
        let label = FieldSpec::new("Label", |g: &Gadget| &g.label, |g: &mut Gadget| &mut g.label);

        let mut gadget = Gadget::default();
        (id.setter)(&mut gadget, Value::Integer(9)).unwrap();
        (label.setter)(&mut gadget, Value::Text("left".into())).unwrap();

        assert_eq!((id.getter)(&gadget), Value::Integer(9));
        assert_eq!(gadget.label, "left");
        assert!((id.setter)(&mut gadget, Value::Text("nine".into())).is_err());
    }
}
