//! Record contracts.

use crate::model::table::{short_type_name, TableModel};
use std::any::Any;

/// A statically declared record type mapped to one table.
///
/// `table_model` is evaluated once per process by the model registry.
pub trait Record: Default + Clone + Send + Sync + 'static {
    fn table_model() -> TableModel<Self>;
}

/// Object-safe view of any record, used by type-erased table operations.
pub trait AnyRecord: Send + Sync {
    fn record_type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn clone_boxed(&self) -> Box<dyn AnyRecord>;
}

impl<T: Record> AnyRecord for T {
    fn record_type_name(&self) -> &'static str {
        short_type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn AnyRecord> {
        Box::new(self.clone())
    }
}

impl<'a> dyn AnyRecord + 'a {
    pub fn downcast_ref<T: Record>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Record>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl std::fmt::Debug for dyn AnyRecord + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AnyRecord({})", self.record_type_name())
    }
}
