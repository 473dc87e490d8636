//! Capability-keyed extension registry

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry mapping a capability (usually a trait object type) to its
/// implementations, in registration order.
///
/// Populated at process start, then read through [`get_extensions`].
///
/// [`get_extensions`]: ExtensionRegistry::get_extensions
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation of capability `T`
    pub fn register<T>(&mut self, extension: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let slot = self
            .extensions
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Vec::<Arc<T>>::new()) as Box<dyn Any + Send + Sync>);
        if let Some(list) = slot.downcast_mut::<Vec<Arc<T>>>() {
            list.push(extension);
        }
        self
    }

    /// All implementations of capability `T`, in registration order
    pub fn get_extensions<T>(&self) -> Vec<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref::<Vec<Arc<T>>>())
            .cloned()
            .unwrap_or_default()
    }

    pub fn has<T>(&self) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        !self.get_extensions::<T>().is_empty()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("capabilities", &self.extensions.len())
            .finish()
    }
}
