//! Handler-routed error recovery over table operations.
//!
//! # Responsibility
//! - Wrap `TableOperations` for callers that prefer callback recovery.
//! - Convert recoverable failures into safe default results.
//!
//! # Invariants
//! - Without a handler every error propagates unchanged.
//! - With a handler, recoverable errors are handed over exactly once and
//!   the call returns its default: `None`, empty, `0` rows, or `-1` for
//!   counts.
//! - Programmer errors (`ModelError::is_programmer_error`) always
//!   propagate, handler or not.

use crate::model::record::Record;
use crate::model::restriction::RecordRestriction;
use crate::model::value::Value;
use crate::repo::error::{ModelError, ModelResult};
use crate::repo::table_operations::TableOperations;
use log::warn;

/// Receives errors that were converted into default results.
pub type ErrorHandler<'a> = Box<dyn FnMut(ModelError) + 'a>;

pub struct RecoveringTableOperations<'a, T: Record> {
    operations: TableOperations<'a, T>,
    handler: Option<ErrorHandler<'a>>,
}

impl<'a, T: Record> RecoveringTableOperations<'a, T> {
    /// Wraps `operations` without a handler; errors propagate.
    pub fn new(operations: TableOperations<'a, T>) -> Self {
        Self {
            operations,
            handler: None,
        }
    }

    pub fn with_handler(
        operations: TableOperations<'a, T>,
        handler: impl FnMut(ModelError) + 'a,
    ) -> Self {
        Self {
            operations,
            handler: Some(Box::new(handler)),
        }
    }

    pub fn set_exception_handler(&mut self, handler: Option<ErrorHandler<'a>>) {
        self.handler = handler;
    }

    pub fn has_exception_handler(&self) -> bool {
        self.handler.is_some()
    }

    pub fn operations(&self) -> &TableOperations<'a, T> {
        &self.operations
    }

    pub fn operations_mut(&mut self) -> &mut TableOperations<'a, T> {
        &mut self.operations
    }

    pub fn into_operations(self) -> TableOperations<'a, T> {
        self.operations
    }

    fn recover<R>(&mut self, result: ModelResult<R>, fallback: R) -> ModelResult<R> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if err.is_programmer_error() {
            return Err(err);
        }
        let Some(handler) = self.handler.as_mut() else {
            return Err(err);
        };

        warn!(
            "event=error_recovered module=service status=handled record_type={}",
            self.operations.record_type_name()
        );
        handler(err);
        Ok(fallback)
    }

    pub fn new_record(&mut self) -> ModelResult<Option<T>> {
        let result = self.operations.new_record().map(Some);
        self.recover(result, None)
    }

    pub fn query_record(
        &mut self,
        restriction: Option<&RecordRestriction>,
    ) -> ModelResult<Option<T>> {
        let result = self.operations.query_record(restriction);
        self.recover(result, None)
    }

    pub fn query_record_where(
        &mut self,
        filter_expression: &str,
        parameters: Vec<Value>,
    ) -> ModelResult<Option<T>> {
        let result = self.operations.query_record_where(filter_expression, parameters);
        self.recover(result, None)
    }

    pub fn query_records(
        &mut self,
        order_by: Option<&str>,
        restriction: Option<&RecordRestriction>,
        limit: Option<usize>,
    ) -> ModelResult<Vec<T>> {
        let result = self.operations.query_records(order_by, restriction, limit);
        self.recover(result, Vec::new())
    }

    pub fn query_records_where(
        &mut self,
        filter_expression: &str,
        parameters: Vec<Value>,
    ) -> ModelResult<Vec<T>> {
        let result = self.operations.query_records_where(filter_expression, parameters);
        self.recover(result, Vec::new())
    }

    pub fn query_records_paged(
        &mut self,
        sort_field: Option<&str>,
        ascending: bool,
        page: usize,
        page_size: usize,
        restriction: Option<&RecordRestriction>,
    ) -> ModelResult<Vec<T>> {
        let result = self
            .operations
            .query_records_paged(sort_field, ascending, page, page_size, restriction);
        self.recover(result, Vec::new())
    }

    pub fn query_records_paged_search(
        &mut self,
        sort_field: Option<&str>,
        ascending: bool,
        page: usize,
        page_size: usize,
        search_text: &str,
    ) -> ModelResult<Vec<T>> {
        let result = self
            .operations
            .query_records_paged_search(sort_field, ascending, page, page_size, search_text);
        self.recover(result, Vec::new())
    }

    /// Row count, or `-1` when a failure was handed to the handler.
    pub fn query_record_count(
        &mut self,
        restriction: Option<&RecordRestriction>,
    ) -> ModelResult<i64> {
        let result = self.operations.query_record_count(restriction).map(count_to_i64);
        self.recover(result, -1)
    }

    pub fn query_record_count_search(&mut self, search_text: &str) -> ModelResult<i64> {
        let result = self.operations.query_record_count_search(search_text).map(count_to_i64);
        self.recover(result, -1)
    }

    pub fn query_record_count_where(
        &mut self,
        filter_expression: &str,
        parameters: Vec<Value>,
    ) -> ModelResult<i64> {
        let result = self
            .operations
            .query_record_count_where(filter_expression, parameters)
            .map(count_to_i64);
        self.recover(result, -1)
    }

    pub fn search_records(
        &mut self,
        sort_field: Option<&str>,
        ascending: bool,
        search_text: &str,
    ) -> ModelResult<Vec<T>> {
        let result = self.operations.search_records(sort_field, ascending, search_text);
        self.recover(result, Vec::new())
    }

    pub fn load_record(&mut self, primary_keys: &[Value]) -> ModelResult<Option<T>> {
        let result = self.operations.load_record(primary_keys);
        self.recover(result, None)
    }

    pub fn add_new_record(&mut self, record: &T) -> ModelResult<usize> {
        let result = self.operations.add_new_record(record);
        self.recover(result, 0)
    }

    pub fn update_record(
        &mut self,
        record: &mut T,
        restriction: Option<&RecordRestriction>,
        apply_root_query_restriction: Option<bool>,
    ) -> ModelResult<usize> {
        let result = self
            .operations
            .update_record(record, restriction, apply_root_query_restriction);
        self.recover(result, 0)
    }

    pub fn update_record_where(
        &mut self,
        record: &mut T,
        filter_expression: &str,
        parameters: Vec<Value>,
    ) -> ModelResult<usize> {
        let result = self.operations.update_record_where(record, filter_expression, parameters);
        self.recover(result, 0)
    }

    pub fn add_new_or_update_record(&mut self, record: &mut T) -> ModelResult<usize> {
        let result = self.operations.add_new_or_update_record(record);
        self.recover(result, 0)
    }

    pub fn delete_record(&mut self, primary_keys: &[Value]) -> ModelResult<usize> {
        let result = self.operations.delete_record(primary_keys);
        self.recover(result, 0)
    }

    pub fn delete_record_instance(&mut self, record: &T) -> ModelResult<usize> {
        let result = self.operations.delete_record_instance(record);
        self.recover(result, 0)
    }

    pub fn delete_records(
        &mut self,
        restriction: &RecordRestriction,
        apply_root_query_restriction: Option<bool>,
    ) -> ModelResult<usize> {
        let result = self
            .operations
            .delete_records(restriction, apply_root_query_restriction);
        self.recover(result, 0)
    }

    pub fn delete_record_where(
        &mut self,
        filter_expression: &str,
        parameters: Vec<Value>,
    ) -> ModelResult<usize> {
        let result = self.operations.delete_record_where(filter_expression, parameters);
        self.recover(result, 0)
    }
}

fn count_to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
