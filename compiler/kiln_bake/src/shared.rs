//! Frozen, thread-safe registry handle.
//!
//! Registration needs `&mut TypeRegistry`; baking only ever reads. Once a
//! registry is handed to a [`Bakery`](crate::Bakery) it is wrapped here and
//! never mutated again, so any number of threads (and bakeries with
//! different configurations) can bake from it.

use std::fmt;
use std::sync::Arc;

pub struct SharedRegistry<T>(Arc<T>);

impl<T> SharedRegistry<T> {
    pub fn new(registry: T) -> Self {
        SharedRegistry(Arc::new(registry))
    }

    /// Whether both handles freeze the same registry.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for SharedRegistry<T> {
    fn clone(&self) -> Self {
        SharedRegistry(Arc::clone(&self.0))
    }
}

impl<T> std::ops::Deref for SharedRegistry<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for SharedRegistry<T> {
    fn from(registry: T) -> Self {
        SharedRegistry::new(registry)
    }
}

impl<T> fmt::Debug for SharedRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedRegistry({} handles)", Arc::strong_count(&self.0))
    }
}
