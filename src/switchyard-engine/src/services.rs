//! Service lookup for parameters supplied by the host instead of the command line.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identity of a service type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ServiceKey {
    /// Key for service type `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` lookups are keyed on.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Type name, for diagnostics only.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// A type-erased service instance bound into an invocation.
#[derive(Clone)]
pub struct ServiceHandle {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl ServiceHandle {
    /// Wrap a shared service instance.
    pub fn new<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            value,
        }
    }

    /// Name of the wrapped type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The instance as `T`, or `None` if it is another type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl PartialEq for ServiceHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

/// Resolves values for service-backed parameters.
///
/// Configured once on [`crate::RuntimeConfig`] and only read during dispatch.
pub trait ServiceProvider: Send + Sync {
    /// The instance registered for `key`, if any.
    fn resolve(&self, key: &ServiceKey) -> Option<ServiceHandle>;
}

/// A simple map-backed [`ServiceProvider`].
#[derive(Default, Clone)]
pub struct ServiceCollection {
    services: HashMap<TypeId, ServiceHandle>,
}

impl ServiceCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service instance, replacing any previous instance of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.insert_arc(Arc::new(value))
    }

    /// Register an already shared instance.
    pub fn insert_arc<T: Any + Send + Sync>(&mut self, value: Arc<T>) -> &mut Self {
        self.services
            .insert(TypeId::of::<T>(), ServiceHandle::new(value));
        self
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Number of registered service types.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Check whether no service is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl ServiceProvider for ServiceCollection {
    fn resolve(&self, key: &ServiceKey) -> Option<ServiceHandle> {
        self.services.get(&key.type_id()).cloned()
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.services.values().map(ServiceHandle::type_name).collect();
        names.sort_unstable();
        f.debug_struct("ServiceCollection")
            .field("services", &names)
            .finish()
    }
}

impl<F> ServiceProvider for F
where
    F: Fn(&ServiceKey) -> Option<ServiceHandle> + Send + Sync,
{
    fn resolve(&self, key: &ServiceKey) -> Option<ServiceHandle> {
        self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Database {
        url: String,
    }

    #[test]
    fn test_collection_resolves_by_type() {
        let services = ServiceCollection::new().with(Database {
            url: "sqlite::memory:".to_string(),
        });

        let handle = services.resolve(&ServiceKey::of::<Database>()).unwrap();
        let db = handle.downcast::<Database>().unwrap();
        assert_eq!(db.url, "sqlite::memory:");

        assert!(services.resolve(&ServiceKey::of::<String>()).is_none());
    }

    #[test]
    fn test_closure_provider() {
        let provider = |key: &ServiceKey| {
            (key.type_id() == TypeId::of::<u32>()).then(|| ServiceHandle::new(Arc::new(7u32)))
        };

        let handle = provider.resolve(&ServiceKey::of::<u32>()).unwrap();
        assert_eq!(*handle.downcast::<u32>().unwrap(), 7);
        assert!(handle.downcast::<i64>().is_none());
    }

    #[test]
    fn test_handles_compare_by_identity() {
        let shared = Arc::new(Database {
            url: "a".to_string(),
        });
        let a = ServiceHandle::new(Arc::clone(&shared));
        let b = ServiceHandle::new(shared);
        let c = ServiceHandle::new(Arc::new(Database {
            url: "a".to_string(),
        }));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
