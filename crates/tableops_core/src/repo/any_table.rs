//! Type-erased table operations.
//!
//! Lets callers hold table operations for several record types behind one
//! trait object, e.g. in a map keyed by table name. Records cross the
//! boundary as `dyn AnyRecord` and are checked against the concrete type
//! before any statement runs.

use crate::db::DataRow;
use crate::model::record::{AnyRecord, Record};
use crate::model::restriction::RecordRestriction;
use crate::model::table::short_type_name;
use crate::model::value::Value;
use crate::repo::error::{ModelError, ModelResult};
use crate::repo::table_operations::TableOperations;

pub trait AnyTableOperations {
    fn record_type_name(&self) -> &str;

    fn table_name(&self) -> &str;

    fn new_record(&self) -> ModelResult<Box<dyn AnyRecord>>;

    fn query_record(
        &self,
        restriction: Option<&RecordRestriction>,
    ) -> ModelResult<Option<Box<dyn AnyRecord>>>;

    fn query_records(
        &self,
        order_by: Option<&str>,
        restriction: Option<&RecordRestriction>,
        limit: Option<usize>,
    ) -> ModelResult<Vec<Box<dyn AnyRecord>>>;

    fn query_records_paged(
        &mut self,
        sort_field: Option<&str>,
        ascending: bool,
        page: usize,
        page_size: usize,
        restriction: Option<&RecordRestriction>,
    ) -> ModelResult<Vec<Box<dyn AnyRecord>>>;

    fn query_record_count(&self, restriction: Option<&RecordRestriction>) -> ModelResult<usize>;

    fn search_records(
        &self,
        sort_field: Option<&str>,
        ascending: bool,
        search_text: &str,
    ) -> ModelResult<Vec<Box<dyn AnyRecord>>>;

    fn load_record(&self, primary_keys: &[Value]) -> ModelResult<Option<Box<dyn AnyRecord>>>;

    fn load_record_from_row(&self, row: &DataRow) -> ModelResult<Option<Box<dyn AnyRecord>>>;

    fn add_new_record(&mut self, record: &dyn AnyRecord) -> ModelResult<usize>;

    fn update_record(
        &mut self,
        record: &mut dyn AnyRecord,
        restriction: Option<&RecordRestriction>,
        apply_root_query_restriction: Option<bool>,
    ) -> ModelResult<usize>;

    fn add_new_or_update_record(&mut self, record: &mut dyn AnyRecord) -> ModelResult<usize>;

    fn delete_record(&mut self, primary_keys: &[Value]) -> ModelResult<usize>;

    fn delete_record_instance(&mut self, record: &dyn AnyRecord) -> ModelResult<usize>;

    fn delete_records(
        &mut self,
        restriction: &RecordRestriction,
        apply_root_query_restriction: Option<bool>,
    ) -> ModelResult<usize>;

    fn get_primary_keys(&self, record: &dyn AnyRecord) -> ModelResult<Vec<Value>>;

    fn get_field_names(&self, escaped: bool) -> Vec<String>;

    fn get_primary_key_field_names(&self, escaped: bool) -> Vec<String>;

    fn get_field_value(&self, record: &dyn AnyRecord, field_name: &str) -> ModelResult<Value>;

    fn is_search_match(&self, record: &dyn AnyRecord, terms: &[&str]) -> ModelResult<bool>;

    fn get_search_restriction(&self, search_text: &str) -> Option<RecordRestriction>;

    fn clear_primary_key_cache(&mut self);
}

fn expect_ref<'a, T: Record>(
    operation: &'static str,
    record: &'a dyn AnyRecord,
) -> ModelResult<&'a T> {
    let actual = record.record_type_name();
    record.downcast_ref::<T>().ok_or(ModelError::RecordTypeMismatch {
        operation,
        expected: short_type_name::<T>(),
        actual,
    })
}

fn expect_mut<'a, T: Record>(
    operation: &'static str,
    record: &'a mut dyn AnyRecord,
) -> ModelResult<&'a mut T> {
    let actual = record.record_type_name();
    record.downcast_mut::<T>().ok_or(ModelError::RecordTypeMismatch {
        operation,
        expected: short_type_name::<T>(),
        actual,
    })
}

fn boxed<T: Record>(records: Vec<T>) -> Vec<Box<dyn AnyRecord>> {
    records
        .into_iter()
        .map(|record| Box::new(record) as Box<dyn AnyRecord>)
        .collect()
}

fn boxed_one<T: Record>(record: Option<T>) -> Option<Box<dyn AnyRecord>> {
    record.map(|record| Box::new(record) as Box<dyn AnyRecord>)
}

impl<T: Record> AnyTableOperations for TableOperations<'_, T> {
    fn record_type_name(&self) -> &str {
        TableOperations::record_type_name(self)
    }

    fn table_name(&self) -> &str {
        TableOperations::table_name(self)
    }

    fn new_record(&self) -> ModelResult<Box<dyn AnyRecord>> {
        let record: Box<dyn AnyRecord> = Box::new(TableOperations::new_record(self)?);
        Ok(record)
    }

    fn query_record(
        &self,
        restriction: Option<&RecordRestriction>,
    ) -> ModelResult<Option<Box<dyn AnyRecord>>> {
        TableOperations::query_record(self, restriction).map(boxed_one)
    }

    fn query_records(
        &self,
        order_by: Option<&str>,
        restriction: Option<&RecordRestriction>,
        limit: Option<usize>,
    ) -> ModelResult<Vec<Box<dyn AnyRecord>>> {
        TableOperations::query_records(self, order_by, restriction, limit).map(boxed)
    }

    fn query_records_paged(
        &mut self,
        sort_field: Option<&str>,
        ascending: bool,
        page: usize,
        page_size: usize,
        restriction: Option<&RecordRestriction>,
    ) -> ModelResult<Vec<Box<dyn AnyRecord>>> {
        TableOperations::query_records_paged(
            self,
            sort_field,
            ascending,
            page,
            page_size,
            restriction,
        )
        .map(boxed)
    }

    fn query_record_count(&self, restriction: Option<&RecordRestriction>) -> ModelResult<usize> {
        TableOperations::query_record_count(self, restriction)
    }

    fn search_records(
        &self,
        sort_field: Option<&str>,
        ascending: bool,
        search_text: &str,
    ) -> ModelResult<Vec<Box<dyn AnyRecord>>> {
        TableOperations::search_records(self, sort_field, ascending, search_text).map(boxed)
    }

    fn load_record(&self, primary_keys: &[Value]) -> ModelResult<Option<Box<dyn AnyRecord>>> {
        TableOperations::load_record(self, primary_keys).map(boxed_one)
    }

    fn load_record_from_row(&self, row: &DataRow) -> ModelResult<Option<Box<dyn AnyRecord>>> {
        TableOperations::load_record_from_row(self, row).map(boxed_one)
    }

    fn add_new_record(&mut self, record: &dyn AnyRecord) -> ModelResult<usize> {
        let record = expect_ref::<T>("add new record", record)?;
        TableOperations::add_new_record(self, record)
    }

    fn update_record(
        &mut self,
        record: &mut dyn AnyRecord,
        restriction: Option<&RecordRestriction>,
        apply_root_query_restriction: Option<bool>,
    ) -> ModelResult<usize> {
        let record = expect_mut::<T>("update record", record)?;
        TableOperations::update_record(self, record, restriction, apply_root_query_restriction)
    }

    fn add_new_or_update_record(&mut self, record: &mut dyn AnyRecord) -> ModelResult<usize> {
        let record = expect_mut::<T>("add new or update record", record)?;
        TableOperations::add_new_or_update_record(self, record)
    }

    fn delete_record(&mut self, primary_keys: &[Value]) -> ModelResult<usize> {
        TableOperations::delete_record(self, primary_keys)
    }

    fn delete_record_instance(&mut self, record: &dyn AnyRecord) -> ModelResult<usize> {
        let record = expect_ref::<T>("delete record", record)?;
        TableOperations::delete_record_instance(self, record)
    }

    fn delete_records(
        &mut self,
        restriction: &RecordRestriction,
        apply_root_query_restriction: Option<bool>,
    ) -> ModelResult<usize> {
        TableOperations::delete_records(self, restriction, apply_root_query_restriction)
    }

    fn get_primary_keys(&self, record: &dyn AnyRecord) -> ModelResult<Vec<Value>> {
        let record = expect_ref::<T>("get primary keys", record)?;
        Ok(TableOperations::get_primary_keys(self, record))
    }

    fn get_field_names(&self, escaped: bool) -> Vec<String> {
        TableOperations::get_field_names(self, escaped)
    }

    fn get_primary_key_field_names(&self, escaped: bool) -> Vec<String> {
        TableOperations::get_primary_key_field_names(self, escaped)
    }

    fn get_field_value(&self, record: &dyn AnyRecord, field_name: &str) -> ModelResult<Value> {
        let record = expect_ref::<T>("get field value", record)?;
        TableOperations::get_field_value(self, record, field_name)
    }

    fn is_search_match(&self, record: &dyn AnyRecord, terms: &[&str]) -> ModelResult<bool> {
        let record = expect_ref::<T>("match search", record)?;
        Ok(TableOperations::is_search_match(self, record, terms))
    }

    fn get_search_restriction(&self, search_text: &str) -> Option<RecordRestriction> {
        TableOperations::get_search_restriction(self, search_text)
    }

    fn clear_primary_key_cache(&mut self) {
        TableOperations::clear_primary_key_cache(self);
    }
}

#[cfg(test)]
mod tests {
    use super::AnyTableOperations;
    use crate::db::NullConnection;
    use crate::db::Dialect;
    use crate::model::record::{AnyRecord, Record};
    use crate::model::table::{FieldSpec, TableModel};
    use crate::repo::error::ModelError;
    use crate::repo::table_operations::TableOperations;

    #[derive(Debug, Default, Clone)]
    struct Device {
        id: i64,
        acronym: String,
    }

    impl Record for Device {
        fn table_model() -> TableModel<Self> {
            TableModel::new()
                .field(
                    FieldSpec::new("ID", |d: &Device| &d.id, |d: &mut Device| &mut d.id)
                        .primary_key(true),
                )
                .field(FieldSpec::new("Acronym", |d: &Device| &d.acronym, |d: &mut Device| {
                    &mut d.acronym
                }))
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Vendor {
        name: String,
    }

    impl Record for Vendor {
        fn table_model() -> TableModel<Self> {
            TableModel::new().field(FieldSpec::new("Name", |v: &Vendor| &v.name, |v: &mut Vendor| {
                &mut v.name
            }))
        }
    }

    #[test]
    fn record_of_another_type_is_rejected_before_any_statement() {
        let conn = NullConnection::new(Dialect::Sqlite);
        let mut ops: Box<dyn AnyTableOperations + '_> =
            Box::new(TableOperations::<Device>::new(&conn));

        let vendor: Box<dyn AnyRecord> = Box::new(Vendor::default());
        let err = ops.add_new_record(vendor.as_ref()).unwrap_err();
        assert!(matches!(
            err,
            ModelError::RecordTypeMismatch {
                expected: "Device",
                actual: "Vendor",
                ..
            }
        ));
        assert!(err.is_programmer_error());
    }

    #[test]
    fn erased_values_round_trip_through_concrete_type() {
        let conn = NullConnection::new(Dialect::Sqlite);
        let ops: Box<dyn AnyTableOperations + '_> = Box::new(TableOperations::<Device>::new(&conn));

        let record = ops.new_record().unwrap();
        assert_eq!(record.record_type_name(), "Device");
        assert_eq!(
            ops.get_primary_keys(record.as_ref()).unwrap(),
            vec![crate::model::value::Value::Integer(0)]
        );
        assert_eq!(ops.get_field_names(false), vec!["ID".to_string(), "Acronym".to_string()]);
    }
}
