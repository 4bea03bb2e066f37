//! Table operations for one record type over one connection.
//!
//! # Responsibility
//! - Execute the compiled statement family with caller restrictions,
//!   search text, ordering and pagination.
//! - Load rows into records and bind records into statements.
//! - Own the per-instance state: key cache, root restriction and flags.
//!
//! # Invariants
//! - The root restriction is ANDed into every query and count, and into
//!   updates/deletes only when their flag (or a per-call override) says so.
//! - Any successful insert, update or delete that touched rows clears the
//!   key cache.
//! - Instances are not synchronized; use one per request or session.

use crate::db::{DataConnection, DataRow, Parameter};
use crate::model::compiled::{CompiledModel, FieldAccess};
use crate::model::descriptor::FieldDescriptor;
use crate::model::escaping::EscapingResolver;
use crate::model::record::Record;
use crate::model::registry::ModelRegistry;
use crate::model::restriction::{BooleanOperator, RecordRestriction};
use crate::model::table::{TableOptions, ValueSource};
use crate::model::template::TemplateSet;
use crate::model::value::{FieldType, Value, ValueError, ValueKind};
use crate::repo::error::{ModelError, ModelResult};
use crate::repo::key_cache::{page_bounds, KeyCache, KeyCachePager};
use crate::search::{is_search_match, search_restriction, search_terms};
use log::{debug, error, info, warn};
use std::sync::Arc;

pub struct TableOperations<'conn, T: Record> {
    connection: &'conn dyn DataConnection,
    model: Arc<CompiledModel<T>>,
    resolver: EscapingResolver,
    templates: TemplateSet,
    pager: KeyCachePager,
    root_restriction: Option<RecordRestriction>,
    apply_root_to_updates: bool,
    apply_root_to_deletes: bool,
    case_sensitive_field_names: bool,
}

impl<'conn, T: Record> TableOperations<'conn, T> {
    /// Uses the process-wide compiled model of `T` and default options.
    pub fn new(connection: &'conn dyn DataConnection) -> Self {
        Self::with_options(connection, TableOptions::default())
    }

    pub fn with_options(connection: &'conn dyn DataConnection, options: TableOptions) -> Self {
        Self::with_model(connection, ModelRegistry::global().model::<T>(), options)
    }

    /// Uses an explicitly supplied compiled model.
    pub fn with_model(
        connection: &'conn dyn DataConnection,
        model: Arc<CompiledModel<T>>,
        options: TableOptions,
    ) -> Self {
        let (resolver, templates) = model.resolve(connection, &options.custom_tokens);
        let root = model.root_restriction().cloned();

        Self {
            connection,
            resolver,
            templates,
            pager: KeyCachePager::new(),
            root_restriction: root.as_ref().map(|root| root.restriction.clone()),
            apply_root_to_updates: root.as_ref().is_some_and(|root| root.apply_to_updates),
            apply_root_to_deletes: root.as_ref().is_some_and(|root| root.apply_to_deletes),
            case_sensitive_field_names: options.use_case_sensitive_field_names,
            model,
        }
    }

    pub fn connection(&self) -> &'conn dyn DataConnection {
        self.connection
    }

    pub fn compiled_model(&self) -> &Arc<CompiledModel<T>> {
        &self.model
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    pub fn root_query_restriction(&self) -> Option<&RecordRestriction> {
        self.root_restriction.as_ref()
    }

    /// Replaces the root restriction; cached keys no longer apply.
    pub fn set_root_query_restriction(&mut self, restriction: Option<RecordRestriction>) {
        self.root_restriction = restriction;
        self.pager.clear();
    }

    pub fn apply_root_query_restriction_to_updates(&self) -> bool {
        self.apply_root_to_updates
    }

    pub fn set_apply_root_query_restriction_to_updates(&mut self, apply: bool) {
        self.apply_root_to_updates = apply;
    }

    pub fn apply_root_query_restriction_to_deletes(&self) -> bool {
        self.apply_root_to_deletes
    }

    pub fn set_apply_root_query_restriction_to_deletes(&mut self, apply: bool) {
        self.apply_root_to_deletes = apply;
    }

    pub fn use_case_sensitive_field_names(&self) -> bool {
        self.case_sensitive_field_names
    }

    pub fn set_use_case_sensitive_field_names(&mut self, case_sensitive: bool) {
        self.case_sensitive_field_names = case_sensitive;
    }

    /// Table name escaped for this connection.
    pub fn table_name(&self) -> &str {
        self.resolver.table_name()
    }

    pub fn unescaped_table_name(&self) -> &str {
        self.model.descriptors().table_name()
    }

    pub fn record_type_name(&self) -> &str {
        self.model.descriptors().type_name()
    }

    pub fn has_primary_key_identity_field(&self) -> bool {
        self.model.descriptors().has_identity_primary_key()
    }

    // Record creation

    /// Creates a blank record with modeled defaults applied.
    pub fn new_record(&self) -> ModelResult<T> {
        let mut record = T::default();
        self.apply_record_defaults(&mut record)?;
        Ok(record)
    }

    pub fn apply_record_defaults(&self, record: &mut T) -> ModelResult<()> {
        self.apply_value_sources(record, |access| access.default_value.as_ref())
    }

    /// Applies modeled update values, as done before every update.
    pub fn apply_record_updates(&self, record: &mut T) -> ModelResult<()> {
        self.apply_value_sources(record, |access| access.update_value.as_ref())
    }

    fn apply_value_sources(
        &self,
        record: &mut T,
        source: impl Fn(&FieldAccess<T>) -> Option<&ValueSource>,
    ) -> ModelResult<()> {
        for (index, access) in self.model.accessors().iter().enumerate() {
            let Some(source) = source(access) else {
                continue;
            };
            let value = source();
            (access.set)(record, value.clone())
                .map_err(|err| self.assignment_error(index, value, err))?;
        }
        Ok(())
    }

    // Queries

    pub fn query_record(&self, restriction: Option<&RecordRestriction>) -> ModelResult<Option<T>> {
        self.query_record_ordered(None, restriction)
    }

    pub fn query_record_ordered(
        &self,
        order_by: Option<&str>,
        restriction: Option<&RecordRestriction>,
    ) -> ModelResult<Option<T>> {
        Ok(self.query_rows(order_by, restriction, Some(1))?.into_iter().next())
    }

    pub fn query_record_where(
        &self,
        filter_expression: &str,
        parameters: Vec<Value>,
    ) -> ModelResult<Option<T>> {
        let restriction = where_restriction(filter_expression, parameters)?;
        self.query_record(Some(&restriction))
    }

    /// Queries records ordered by `order_by` (the key fields by default).
    ///
    /// Without a `limit` the model's return limit applies, if any.
    pub fn query_records(
        &self,
        order_by: Option<&str>,
        restriction: Option<&RecordRestriction>,
        limit: Option<usize>,
    ) -> ModelResult<Vec<T>> {
        self.query_rows(order_by, restriction, limit.or(self.model.return_limit()))
    }

    pub fn query_records_where(
        &self,
        filter_expression: &str,
        parameters: Vec<Value>,
    ) -> ModelResult<Vec<T>> {
        let restriction = where_restriction(filter_expression, parameters)?;
        self.query_records(None, Some(&restriction), None)
    }

    fn query_rows(
        &self,
        order_by: Option<&str>,
        restriction: Option<&RecordRestriction>,
        limit: Option<usize>,
    ) -> ModelResult<Vec<T>> {
        let order_by = match order_by.map(str::trim).filter(|order| !order.is_empty()) {
            Some(order) => self.update_field_names(order),
            None => self.default_order_by(),
        };
        let restriction = self.compose_root(restriction)?;
        let (sql, parameters) = match &restriction {
            None => (self.templates.select_set.fill("", &order_by), Vec::new()),
            Some(restriction) => (
                self.templates
                    .select_set_where
                    .fill(&self.update_field_names(restriction.filter_expression()), &order_by),
                parameters_of(restriction),
            ),
        };

        let rows = self
            .connection
            .retrieve_rows(&sql, &parameters)
            .map_err(|source| self.db_failure("record query", &sql, &parameters, source))?;

        let limit = limit.filter(|limit| *limit > 0).unwrap_or(usize::MAX);
        let mut records = Vec::new();
        for row in rows.iter().take(limit) {
            if let Some(record) = self.load_record_from_row(row)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Returns one 1-based page of records through the key cache.
    ///
    /// The key query runs only when the sort field, direction or restriction
    /// differs from the cached one. Keys whose row can no longer be loaded
    /// are skipped.
    pub fn query_records_paged(
        &mut self,
        sort_field: Option<&str>,
        ascending: bool,
        page: usize,
        page_size: usize,
        restriction: Option<&RecordRestriction>,
    ) -> ModelResult<Vec<T>> {
        validate_page(page, page_size)?;

        let sort_field = match sort_field.map(str::trim).filter(|field| !field.is_empty()) {
            Some(field) => field.to_string(),
            None => self.default_sort_field(),
        };
        let order_by = format!(
            "{}{}",
            self.order_field(&sort_field),
            if ascending { "" } else { " DESC" }
        );
        let combined = self.compose_root(restriction)?;
        let (sql, parameters) = match &combined {
            None => (self.templates.select_keys.fill("", &order_by), Vec::new()),
            Some(combined) => (
                self.templates
                    .select_keys_where
                    .fill(&self.update_field_names(combined.filter_expression()), &order_by),
                parameters_of(combined),
            ),
        };

        let connection = self.connection;
        let key_columns = self.primary_key_columns();
        let rebuilds = self.pager.rebuild_count();
        let keys = self
            .pager
            .page_keys(&sort_field, ascending, restriction, page, page_size, || {
                connection
                    .retrieve_rows(&sql, &parameters)
                    .map(|rows| rows.iter().map(|row| key_values(row, &key_columns)).collect())
            })
            .map_err(|source| self.db_failure("record query", &sql, &parameters, source))?;

        if self.pager.rebuild_count() != rebuilds {
            info!(
                "event=key_cache_rebuild module=repo status=ok record_type={} keys={}",
                self.record_type_name(),
                self.pager.len()
            );
        }

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            match self.load_record(&key) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(err) => warn!(
                    "event=key_cache_load module=repo status=skipped record_type={} error={}",
                    self.record_type_name(),
                    err
                ),
            }
        }
        Ok(records)
    }

    pub fn query_records_paged_search(
        &mut self,
        sort_field: Option<&str>,
        ascending: bool,
        page: usize,
        page_size: usize,
        search_text: &str,
    ) -> ModelResult<Vec<T>> {
        let restriction = self.get_search_restriction(search_text);
        self.query_records_paged(sort_field, ascending, page, page_size, restriction.as_ref())
    }

    pub fn query_record_count(
        &self,
        restriction: Option<&RecordRestriction>,
    ) -> ModelResult<usize> {
        let restriction = self.compose_root(restriction)?;
        let (sql, parameters) = match &restriction {
            None => (self.templates.count.sql(), Vec::new()),
            Some(restriction) => (
                self.templates
                    .count_where
                    .fill(&self.update_field_names(restriction.filter_expression()), ""),
                parameters_of(restriction),
            ),
        };

        let value = self
            .connection
            .execute_scalar(&sql, &parameters)
            .map_err(|source| self.db_failure("record count query", &sql, &parameters, source))?;
        let count = i64::from_value(value)
            .map_err(|err| crate::db::DbError::Conversion(err.to_string()))
            .map_err(|source| self.db_failure("record count query", &sql, &parameters, source))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn query_record_count_search(&self, search_text: &str) -> ModelResult<usize> {
        let restriction = self.get_search_restriction(search_text);
        self.query_record_count(restriction.as_ref())
    }

    pub fn query_record_count_where(
        &self,
        filter_expression: &str,
        parameters: Vec<Value>,
    ) -> ModelResult<usize> {
        let restriction = where_restriction(filter_expression, parameters)?;
        self.query_record_count(Some(&restriction))
    }

    /// Loads every record and keeps those matching `search_text` locally.
    ///
    /// Returns nothing when the model has no searchable field or the text
    /// is blank.
    pub fn search_records(
        &self,
        sort_field: Option<&str>,
        ascending: bool,
        search_text: &str,
    ) -> ModelResult<Vec<T>> {
        let terms = search_terms(search_text);
        if self.templates.search_filter().is_none() || terms.is_empty() {
            return Ok(Vec::new());
        }

        let sort_field = match sort_field.map(str::trim).filter(|field| !field.is_empty()) {
            Some(field) => field.to_string(),
            None => self.default_sort_field(),
        };
        let order_by = format!(
            "{}{}",
            self.order_field(&sort_field),
            if ascending { "" } else { " DESC" }
        );

        let records = self.query_rows(Some(&order_by), None, None)?;
        Ok(records
            .into_iter()
            .filter(|record| self.is_search_match(record, &terms))
            .collect())
    }

    pub fn is_search_match(&self, record: &T, terms: &[&str]) -> bool {
        is_search_match(&self.model, record, terms)
    }

    /// Slices already loaded records into a 1-based page.
    pub fn get_page_of_records<'a>(
        &self,
        records: &'a [T],
        page: usize,
        page_size: usize,
    ) -> ModelResult<&'a [T]> {
        validate_page(page, page_size)?;
        Ok(&records[page_bounds(page, page_size, records.len())])
    }

    /// Loads the record with `primary_keys`, in key field order.
    pub fn load_record(&self, primary_keys: &[Value]) -> ModelResult<Option<T>> {
        let key_indices = self.model.descriptors().primary_key_indices();
        if primary_keys.len() != key_indices.len() {
            return Err(ModelError::KeyCountMismatch {
                record_type: self.record_type_name().to_string(),
                expected: key_indices.len(),
                actual: primary_keys.len(),
            });
        }

        let parameters = self.interpreted_keys(primary_keys);
        let sql = self.templates.select_row.sql();
        let row = self
            .connection
            .retrieve_row(&sql, &parameters)
            .map_err(|source| self.db_failure("record load", &sql, &parameters, source))?;

        match row {
            Some(row) => self.load_record_from_row(&row),
            None => Ok(None),
        }
    }

    /// Builds a record from a row; `None` for the blank row of an
    /// identity-keyed model.
    pub fn load_record_from_row(&self, row: &DataRow) -> ModelResult<Option<T>> {
        let descriptors = self.model.descriptors();
        if descriptors.has_identity_primary_key() {
            let keys = self.get_primary_keys_from_row(row);
            if keys.iter().all(Value::is_default) {
                return Ok(None);
            }
        }

        let mut record = T::default();
        for (index, field) in descriptors.fields().iter().enumerate() {
            let Some(value) = row.get(&field.field_name) else {
                continue;
            };
            if let Some(Err(err)) = self.model.set_value(&mut record, index, value.clone()) {
                return Err(self.assignment_error(index, value.clone(), err));
            }
        }
        Ok(Some(record))
    }

    // Mutations

    pub fn add_new_record(&mut self, record: &T) -> ModelResult<usize> {
        let parameters = self.interpreted_values(record, self.model.descriptors().insert_indices());
        let sql = self.templates.insert.sql();
        let affected = self
            .connection
            .execute_non_query(&sql, &parameters)
            .map_err(|source| self.db_failure("record insert", &sql, &parameters, source))?;
        self.after_mutation("record_insert", affected);
        Ok(affected)
    }

    /// Updates `record` by its keys, or by `restriction` when given.
    ///
    /// Modeled update values are applied to `record` first. A caller
    /// restriction is renumbered to follow the SET values.
    pub fn update_record(
        &mut self,
        record: &mut T,
        restriction: Option<&RecordRestriction>,
        apply_root_query_restriction: Option<bool>,
    ) -> ModelResult<usize> {
        self.apply_record_updates(record)?;

        let descriptors = self.model.descriptors();
        let update_indices = descriptors.update_indices();
        let mut parameters = self.interpreted_values(record, update_indices);
        let apply_root = apply_root_query_restriction.unwrap_or(self.apply_root_to_updates);
        let scope = match (restriction, apply_root && self.root_restriction.is_some()) {
            (None, false) => None,
            (Some(restriction), false) => Some((restriction.clone(), parameters_of(restriction))),
            (Some(restriction), true) => self.compose_root(Some(restriction))?.map(|scope| {
                let scope_parameters = parameters_of(&scope);
                (scope, scope_parameters)
            }),
            (None, true) => Some(self.root_key_scope(&self.get_primary_keys(record))?),
        };

        let sql = match scope {
            None => {
                let key_indices = descriptors.primary_key_indices();
                parameters.extend(self.interpreted_values(record, key_indices));
                self.templates.update.sql()
            }
            Some((scope, scope_parameters)) => {
                parameters.extend(scope_parameters);
                let filter =
                    self.update_field_names(&scope.offset_expression(update_indices.len()));
                self.templates.update_where.fill(&filter, "")
            }
        };

        let affected = self
            .connection
            .execute_non_query(&sql, &parameters)
            .map_err(|source| self.db_failure("record update", &sql, &parameters, source))?;
        self.after_mutation("record_update", affected);
        Ok(affected)
    }

    pub fn update_record_where(
        &mut self,
        record: &mut T,
        filter_expression: &str,
        parameters: Vec<Value>,
    ) -> ModelResult<usize> {
        let restriction = where_restriction(filter_expression, parameters)?;
        self.update_record(record, Some(&restriction), None)
    }

    /// Inserts when every key value is its default, updates otherwise.
    pub fn add_new_or_update_record(&mut self, record: &mut T) -> ModelResult<usize> {
        let keys = self.get_primary_keys(record);
        if keys.iter().all(Value::is_default) {
            self.add_new_record(record)
        } else {
            self.update_record(record, None, None)
        }
    }

    pub fn delete_record(&mut self, primary_keys: &[Value]) -> ModelResult<usize> {
        let key_count = self.model.descriptors().primary_key_indices().len();
        if primary_keys.len() != key_count {
            return Err(ModelError::KeyCountMismatch {
                record_type: self.record_type_name().to_string(),
                expected: key_count,
                actual: primary_keys.len(),
            });
        }

        if self.apply_root_to_deletes && self.root_restriction.is_some() {
            let (scope, parameters) = self.root_key_scope(primary_keys)?;
            return self.delete_scoped(&scope, parameters);
        }

        let parameters = self.interpreted_keys(primary_keys);
        let sql = self.templates.delete.sql();
        let affected = self
            .connection
            .execute_non_query(&sql, &parameters)
            .map_err(|source| self.db_failure("record delete", &sql, &parameters, source))?;
        self.after_mutation("record_delete", affected);
        Ok(affected)
    }

    pub fn delete_record_instance(&mut self, record: &T) -> ModelResult<usize> {
        let keys = self.get_primary_keys(record);
        self.delete_record(&keys)
    }

    /// Deletes every row matching `restriction`.
    pub fn delete_records(
        &mut self,
        restriction: &RecordRestriction,
        apply_root_query_restriction: Option<bool>,
    ) -> ModelResult<usize> {
        let scope = if apply_root_query_restriction.unwrap_or(self.apply_root_to_deletes) {
            self.compose_root(Some(restriction))?
                .unwrap_or_else(|| restriction.clone())
        } else {
            restriction.clone()
        };
        let parameters = parameters_of(&scope);
        self.delete_scoped(&scope, parameters)
    }

    fn delete_scoped(
        &mut self,
        scope: &RecordRestriction,
        parameters: Vec<Parameter>,
    ) -> ModelResult<usize> {
        let sql = self
            .templates
            .delete_where
            .fill(&self.update_field_names(scope.filter_expression()), "");
        let affected = self
            .connection
            .execute_non_query(&sql, &parameters)
            .map_err(|source| self.db_failure("record delete", &sql, &parameters, source))?;
        self.after_mutation("record_delete", affected);
        Ok(affected)
    }

    pub fn delete_record_where(
        &mut self,
        filter_expression: &str,
        parameters: Vec<Value>,
    ) -> ModelResult<usize> {
        let restriction = where_restriction(filter_expression, parameters)?;
        self.delete_records(&restriction, None)
    }

    // Introspection

    /// Key values of `record`, in key field order.
    pub fn get_primary_keys(&self, record: &T) -> Vec<Value> {
        self.model
            .values(record, self.model.descriptors().primary_key_indices())
    }

    /// Key values read by column name; missing columns read as null.
    pub fn get_primary_keys_from_row(&self, row: &DataRow) -> Vec<Value> {
        key_values(row, &self.primary_key_columns())
    }

    pub fn get_field_names(&self, escaped: bool) -> Vec<String> {
        if escaped {
            return self.resolver.field_names().to_vec();
        }
        self.model
            .descriptors()
            .fields()
            .iter()
            .map(|field| field.field_name.clone())
            .collect()
    }

    /// Key field names; `["*"]` when the model declares no primary key.
    pub fn get_primary_key_field_names(&self, escaped: bool) -> Vec<String> {
        let descriptors = self.model.descriptors();
        if !descriptors.has_any_primary_key() {
            return vec!["*".to_string()];
        }

        descriptors
            .primary_key_indices()
            .iter()
            .filter_map(|index| {
                if escaped {
                    Some(self.resolver.field_name(*index).to_string())
                } else {
                    descriptors.field(*index).map(|field| field.field_name.clone())
                }
            })
            .collect()
    }

    pub fn field_descriptor(&self, field_name: &str) -> Option<&FieldDescriptor> {
        let descriptors = self.model.descriptors();
        descriptors.index_of(field_name).and_then(|index| descriptors.field(index))
    }

    pub fn get_field_kind(&self, field_name: &str) -> Option<ValueKind> {
        self.field_descriptor(field_name).map(|field| field.kind)
    }

    pub fn get_field_value(&self, record: &T, field_name: &str) -> ModelResult<Value> {
        self.model
            .descriptors()
            .index_of(field_name)
            .and_then(|index| self.model.get_value(record, index))
            .ok_or_else(|| ModelError::UnknownField {
                record_type: self.record_type_name().to_string(),
                field: field_name.to_string(),
            })
    }

    /// Binds `value` the way the named field's values are bound.
    ///
    /// Caller restrictions that compare against a field with an explicit
    /// data type should pass their values through here.
    pub fn get_interpreted_field_value(&self, field_name: &str, value: Value) -> Parameter {
        match self.model.descriptors().index_of(field_name) {
            Some(index) => self.interpreted(index, value),
            None => Parameter::new(value),
        }
    }

    pub fn get_search_restriction(&self, search_text: &str) -> Option<RecordRestriction> {
        search_restriction(self.templates.search_filter(), search_text)
    }

    // Key cache

    pub fn primary_key_cache(&self) -> Option<&KeyCache> {
        self.pager.cache()
    }

    pub fn set_primary_key_cache(&mut self, cache: Option<KeyCache>) {
        self.pager.set_cache(cache);
    }

    pub fn primary_key_cache_size(&self) -> usize {
        self.pager.len()
    }

    pub fn clear_primary_key_cache(&mut self) {
        self.pager.clear();
    }

    /// How many times this instance has run the key query.
    pub fn primary_key_cache_rebuilds(&self) -> usize {
        self.pager.rebuild_count()
    }

    // Internals

    fn compose_root(
        &self,
        restriction: Option<&RecordRestriction>,
    ) -> ModelResult<Option<RecordRestriction>> {
        match (self.root_restriction.as_ref(), restriction) {
            (None, None) => Ok(None),
            (root, restriction) => Ok(Some(RecordRestriction::combine(
                root,
                restriction,
                BooleanOperator::And,
            )?)),
        }
    }

    fn update_field_names(&self, expression: &str) -> String {
        if self.resolver.is_passthrough() {
            return expression.to_string();
        }
        self.resolver
            .update_field_names(expression, self.case_sensitive_field_names)
    }

    fn default_order_by(&self) -> String {
        match self.model.default_sort() {
            Some((field, ascending)) => format!(
                "{}{}",
                self.order_field(field),
                if ascending { "" } else { " DESC" }
            ),
            None => self.templates.primary_key_list().to_string(),
        }
    }

    fn default_sort_field(&self) -> String {
        if let Some((field, _)) = self.model.default_sort() {
            return field.to_string();
        }
        let descriptors = self.model.descriptors();
        descriptors
            .primary_key_indices()
            .first()
            .and_then(|index| descriptors.field(*index))
            .map(|field| field.field_name.clone())
            .unwrap_or_default()
    }

    /// Connection form of a modeled field, or the text as given.
    fn order_field(&self, sort_field: &str) -> String {
        match self.model.descriptors().index_of(sort_field) {
            Some(index) => self.resolver.field_name(index).to_string(),
            None => self.update_field_names(sort_field),
        }
    }

    fn primary_key_columns(&self) -> Vec<String> {
        let descriptors = self.model.descriptors();
        descriptors
            .primary_key_indices()
            .iter()
            .filter_map(|index| descriptors.field(*index))
            .map(|field| field.field_name.clone())
            .collect()
    }

    /// `key1={0} AND key2={1}` over `keys`.
    fn key_restriction(&self, keys: &[Value]) -> RecordRestriction {
        let indices = self.model.descriptors().primary_key_indices();
        let expression = indices
            .iter()
            .enumerate()
            .map(|(position, index)| format!("{}={{{position}}}", self.resolver.field_name(*index)))
            .collect::<Vec<_>>()
            .join(" AND ");
        RecordRestriction::from_parts(expression, keys.to_vec())
    }

    /// Root restriction ANDed with the key restriction for `keys`.
    ///
    /// Root values bind as given; key values carry their field data types.
    fn root_key_scope(&self, keys: &[Value]) -> ModelResult<(RecordRestriction, Vec<Parameter>)> {
        let target = self.key_restriction(keys);
        let scope = self.compose_root(Some(&target))?.unwrap_or(target);
        let mut parameters: Vec<Parameter> =
            self.root_restriction.iter().flat_map(parameters_of).collect();
        parameters.extend(self.interpreted_keys(keys));
        Ok((scope, parameters))
    }

    fn interpreted(&self, index: usize, value: Value) -> Parameter {
        let data_type = self
            .model
            .descriptors()
            .field(index)
            .and_then(|field| field.data_type_for(self.connection.dialect()));
        match data_type {
            Some(data_type) => Parameter::typed(value, data_type),
            None => Parameter::new(value),
        }
    }

    fn interpreted_values(&self, record: &T, indices: &[usize]) -> Vec<Parameter> {
        indices
            .iter()
            .filter_map(|index| {
                self.model
                    .get_value(record, *index)
                    .map(|value| self.interpreted(*index, value))
            })
            .collect()
    }

    fn interpreted_keys(&self, keys: &[Value]) -> Vec<Parameter> {
        self.model
            .descriptors()
            .primary_key_indices()
            .iter()
            .zip(keys)
            .map(|(index, value)| self.interpreted(*index, value.clone()))
            .collect()
    }

    fn after_mutation(&mut self, event: &str, affected: usize) {
        debug!(
            "event={event} module=repo status=ok record_type={} affected={affected}",
            self.record_type_name()
        );
        if affected > 0 {
            self.pager.clear();
        }
    }

    fn assignment_error(&self, index: usize, value: Value, source: ValueError) -> ModelError {
        ModelError::FieldAssignment {
            record_type: self.record_type_name().to_string(),
            field: self
                .model
                .descriptors()
                .field(index)
                .map(|field| field.property_name.clone())
                .unwrap_or_default(),
            value,
            source,
        }
    }

    fn db_failure(
        &self,
        operation: &'static str,
        sql: &str,
        parameters: &[Parameter],
        source: crate::db::DbError,
    ) -> ModelError {
        error!(
            "event=db_error module=repo status=error operation=\"{operation}\" record_type={} error={source}",
            self.record_type_name()
        );
        ModelError::db(
            operation,
            self.record_type_name(),
            sql,
            parameters.iter().map(|parameter| parameter.value.clone()).collect(),
            source,
        )
    }
}

impl<T: Record> std::fmt::Debug for TableOperations<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableOperations")
            .field("record_type", &self.record_type_name())
            .field("dialect", &self.connection.dialect())
            .field("table_name", &self.table_name())
            .field("root_restriction", &self.root_restriction)
            .field("key_cache_size", &self.pager.len())
            .finish_non_exhaustive()
    }
}

fn parameters_of(restriction: &RecordRestriction) -> Vec<Parameter> {
    restriction.parameters().iter().cloned().map(Parameter::new).collect()
}

fn key_values(row: &DataRow, columns: &[String]) -> Vec<Value> {
    columns
        .iter()
        .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
        .collect()
}

fn where_restriction(
    filter_expression: &str,
    parameters: Vec<Value>,
) -> ModelResult<RecordRestriction> {
    if filter_expression.trim().is_empty() {
        return Err(ModelError::MissingArgument("filter_expression"));
    }
    Ok(RecordRestriction::new(filter_expression, parameters)?)
}

fn validate_page(page: usize, page_size: usize) -> ModelResult<()> {
    if page == 0 || page_size == 0 {
        return Err(ModelError::InvalidArgument(format!(
            "page and page size are 1-based, got page={page} page_size={page_size}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::TableOperations;
    use crate::db::{DataConnection, DataRow, DbResult, Dialect, Parameter};
    use crate::model::compiled::CompiledModel;
    use crate::model::record::Record;
    use crate::model::restriction::RecordRestriction;
    use crate::model::table::{FieldSpec, RootQueryRestriction, TableModel, TableOptions};
    use crate::model::value::Value;
    use crate::repo::error::ModelError;
    use std::cell::RefCell;
    use std::sync::Arc;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Company {
        id: i64,
        name: String,
        active: bool,
    }

    impl Record for Company {
        fn table_model() -> TableModel<Self> {
            TableModel::new()
                .field(
                    FieldSpec::new("ID", |c: &Company| &c.id, |c: &mut Company| &mut c.id)
                        .primary_key(true),
                )
                .field(FieldSpec::new("Name", |c: &Company| &c.name, |c: &mut Company| &mut c.name))
                .field(FieldSpec::new("Active", |c: &Company| &c.active, |c: &mut Company| {
                    &mut c.active
                }))
        }
    }

    fn model(root: Option<RootQueryRestriction>) -> Arc<CompiledModel<Company>> {
        let mut model = Company::table_model();
        if let Some(root) = root {
            model = model.root_query_restriction(root);
        }
        Arc::new(CompiledModel::compile(model))
    }

    /// Records statements and answers every query with the same rows.
    #[derive(Default)]
    struct Recorder {
        statements: RefCell<Vec<(String, Vec<Value>)>>,
        rows: Vec<DataRow>,
        affected: usize,
    }

    impl Recorder {
        fn last(&self) -> (String, Vec<Value>) {
            self.statements.borrow().last().cloned().unwrap_or_default()
        }

        fn record(&self, sql: &str, parameters: &[Parameter]) {
            self.statements.borrow_mut().push((
                sql.to_string(),
                parameters.iter().map(|parameter| parameter.value.clone()).collect(),
            ));
        }
    }

    impl DataConnection for Recorder {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        fn execute_scalar(&self, sql: &str, parameters: &[Parameter]) -> DbResult<Value> {
            self.record(sql, parameters);
            Ok(Value::Integer(self.rows.len() as i64))
        }

        fn execute_non_query(&self, sql: &str, parameters: &[Parameter]) -> DbResult<usize> {
            self.record(sql, parameters);
            Ok(self.affected)
        }

        fn retrieve_rows(&self, sql: &str, parameters: &[Parameter]) -> DbResult<Vec<DataRow>> {
            self.record(sql, parameters);
            Ok(self.rows.clone())
        }
    }

    fn row(id: i64, name: &str) -> DataRow {
        DataRow::new(
            vec!["ID".to_string(), "Name".to_string(), "Active".to_string()].into(),
            vec![Value::Integer(id), Value::Text(name.into()), Value::Integer(1)],
        )
    }

    fn active_only() -> RootQueryRestriction {
        RootQueryRestriction::new(
            RecordRestriction::new("Active={0}", vec![Value::Bool(true)]).unwrap(),
        )
    }

    #[test]
    fn query_records_defaults_to_key_order() {
        let conn = Recorder {
            rows: vec![row(1, "Grid"), row(2, "Mesh")],
            ..Recorder::default()
        };
        let ops = TableOperations::with_model(&conn, model(None), TableOptions::default());

        let records = ops.query_records(None, None, None).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].active);
        assert_eq!(conn.last().0, "SELECT * FROM Company ORDER BY ID");
    }

    #[test]
    fn root_restriction_is_anded_before_caller_restriction() {
        let conn = Recorder::default();
        let ops =
            TableOperations::with_model(&conn, model(Some(active_only())), TableOptions::default());
        let caller = RecordRestriction::new("Name={0}", vec![Value::Text("Grid".into())]).unwrap();

        ops.query_record_count(Some(&caller)).unwrap();
        let (sql, parameters) = conn.last();
        assert_eq!(sql, "SELECT COUNT(*) FROM Company WHERE (Active={0}) AND (Name={1})");
        assert_eq!(parameters, vec![Value::Bool(true), Value::Text("Grid".into())]);
    }

    #[test]
    fn update_by_restriction_offsets_filter_past_set_values() {
        let conn = Recorder {
            affected: 1,
            ..Recorder::default()
        };
        let mut ops = TableOperations::with_model(&conn, model(None), TableOptions::default());
        let mut company = Company {
            id: 3,
            name: "Grid".into(),
            active: true,
        };

        ops.update_record_where(&mut company, "Name={0}", vec![Value::Text("Old".into())])
            .unwrap();
        let (sql, parameters) = conn.last();
        assert_eq!(sql, "UPDATE Company SET Name={0}, Active={1} WHERE Name={2}");
        assert_eq!(parameters.len(), 3);

        ops.update_record(&mut company, None, None).unwrap();
        assert_eq!(conn.last().0, "UPDATE Company SET Name={0}, Active={1} WHERE ID={2}");
    }

    #[test]
    fn update_by_key_stays_scoped_by_root_restriction() {
        let conn = Recorder::default();
        let mut ops =
            TableOperations::with_model(&conn, model(Some(active_only())), TableOptions::default());
        let mut company = Company {
            id: 7,
            ..Company::default()
        };

        ops.update_record(&mut company, None, None).unwrap();
        let (sql, parameters) = conn.last();
        assert_eq!(sql, "UPDATE Company SET Name={0}, Active={1} WHERE (Active={2}) AND (ID={3})");
        assert_eq!(parameters[3], Value::Integer(7));

        ops.update_record(&mut company, None, Some(false)).unwrap();
        assert_eq!(conn.last().0, "UPDATE Company SET Name={0}, Active={1} WHERE ID={2}");
    }

    #[test]
    fn blank_filter_and_wrong_key_count_are_rejected() {
        let conn = Recorder::default();
        let mut ops = TableOperations::with_model(&conn, model(None), TableOptions::default());

        assert!(matches!(
            ops.delete_record_where("  ", Vec::new()),
            Err(ModelError::MissingArgument(_))
        ));
        assert!(matches!(
            ops.load_record(&[Value::Integer(1), Value::Integer(2)]),
            Err(ModelError::KeyCountMismatch { expected: 1, actual: 2, .. })
        ));
        assert!(conn.statements.borrow().is_empty());
    }

    #[test]
    fn identity_row_with_default_key_does_not_load() {
        let conn = Recorder::default();
        let ops = TableOperations::with_model(&conn, model(None), TableOptions::default());

        assert!(ops.load_record_from_row(&row(0, "blank")).unwrap().is_none());
        assert_eq!(
            ops.load_record_from_row(&row(5, "Grid")).unwrap().map(|c| c.name),
            Some("Grid".to_string())
        );
    }

    #[test]
    fn add_new_or_update_picks_statement_by_key_values() {
        let conn = Recorder::default();
        let mut ops = TableOperations::with_model(&conn, model(None), TableOptions::default());

        let mut fresh = Company::default();
        ops.add_new_or_update_record(&mut fresh).unwrap();
        assert!(conn.last().0.starts_with("INSERT INTO Company(Name, Active)"));

        let mut existing = Company {
            id: 2,
            ..Company::default()
        };
        ops.add_new_or_update_record(&mut existing).unwrap();
        assert!(conn.last().0.starts_with("UPDATE Company SET"));
    }

    #[test]
    fn paging_rejects_zero_page_and_reuses_cached_keys() {
        let conn = Recorder {
            rows: vec![row(1, "Grid"), row(2, "Mesh"), row(3, "Node")],
            ..Recorder::default()
        };
        let mut ops = TableOperations::with_model(&conn, model(None), TableOptions::default());

        assert!(matches!(
            ops.query_records_paged(None, true, 0, 10, None),
            Err(ModelError::InvalidArgument(_))
        ));

        ops.query_records_paged(None, true, 1, 2, None).unwrap();
        ops.query_records_paged(Some("id"), true, 2, 2, None).unwrap();
        assert_eq!(ops.primary_key_cache_rebuilds(), 1);
        assert_eq!(ops.primary_key_cache_size(), 3);

        ops.query_records_paged(Some("ID"), false, 1, 2, None).unwrap();
        assert_eq!(ops.primary_key_cache_rebuilds(), 2);
    }

    #[test]
    fn primary_key_field_names_fall_back_to_star_without_keys() {
        #[derive(Debug, Default, Clone)]
        struct Loose {
            code: String,
        }

        impl Record for Loose {
            fn table_model() -> TableModel<Self> {
                TableModel::new().field(FieldSpec::new(
                    "Code",
                    |l: &Loose| &l.code,
                    |l: &mut Loose| &mut l.code,
                ))
            }
        }

        let conn = Recorder::default();
        let keyless = Arc::new(CompiledModel::compile(Loose::table_model()));
        let ops = TableOperations::with_model(&conn, keyless, TableOptions::default());
        assert_eq!(ops.get_primary_key_field_names(false), vec!["*".to_string()]);
    }
}
