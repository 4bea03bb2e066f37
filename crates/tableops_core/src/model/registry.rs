//! Registry of compiled models.
//!
//! # Responsibility
//! - Compile each record type's model at most once per registry.
//! - Hand out shared, read-only compiled models.
//!
//! # Invariants
//! - A compiled model is never replaced once registered.
//! - Lock poisoning never panics callers; the map stays consistent because
//!   entries are only ever inserted whole.

use crate::model::compiled::CompiledModel;
use crate::model::record::Record;
use once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type Entry = Arc<dyn Any + Send + Sync>;

static GLOBAL_REGISTRY: Lazy<ModelRegistry> = Lazy::new(ModelRegistry::new);

#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<TypeId, Entry>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by `TableOperations::new`.
    pub fn global() -> &'static ModelRegistry {
        &GLOBAL_REGISTRY
    }

    /// Returns the compiled model of `T`, compiling it on first use.
    pub fn model<T: Record>(&self) -> Arc<CompiledModel<T>> {
        let type_id = TypeId::of::<T>();
        if let Some(model) = self.lookup::<T>(type_id) {
            return model;
        }

        // Compile outside the lock; a racing registration wins and ours is dropped.
        let compiled: Arc<CompiledModel<T>> = Arc::new(CompiledModel::compile(T::table_model()));
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        let entry = models
            .entry(type_id)
            .or_insert_with(|| compiled.clone() as Entry)
            .clone();
        drop(models);

        entry.downcast::<CompiledModel<T>>().unwrap_or(compiled)
    }

    pub fn is_registered<T: Record>(&self) -> bool {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.models.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup<T: Record>(&self, type_id: TypeId) -> Option<Arc<CompiledModel<T>>> {
        let entry = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()?;
        entry.downcast::<CompiledModel<T>>().ok()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry").field("models", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ModelRegistry;
    use crate::model::record::Record;
    use crate::model::table::{FieldSpec, TableModel};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    static COMPILES: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Default, Clone)]
    struct Probe {
        id: i64,
    }

    impl Record for Probe {
        fn table_model() -> TableModel<Self> {
            COMPILES.fetch_add(1, Ordering::SeqCst);
            TableModel::new().field(
                FieldSpec::new("ID", |p: &Probe| &p.id, |p: &mut Probe| &mut p.id)
                    .primary_key(true),
            )
        }
    }

    #[test]
    fn model_is_compiled_once_and_shared() {
        let registry = ModelRegistry::new();
        assert!(!registry.is_registered::<Probe>());

        let first = registry.model::<Probe>();
        let second = registry.model::<Probe>();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(COMPILES.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(first.descriptors().table_name(), "Probe");
    }
}
