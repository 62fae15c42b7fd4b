//! Wiring manifests and dependency slots.

use crate::error::InjectError;
use crate::graph::Resolver;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A write-once slot holding a wired dependency.
///
/// Declared as a field on an injectable object and filled by the graph
/// during populate. Cloning a `Dep` clones the handle, not the slot.
pub struct Dep<T: ?Sized> {
    slot: Arc<OnceLock<Arc<T>>>,
}

impl<T: ?Sized> Dep<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(OnceLock::new()),
        }
    }

    /// Returns the wired value.
    ///
    /// # Panics
    ///
    /// Panics when the slot has not been wired; using a dependency before
    /// the graph populated it is a programmer error.
    pub fn get(&self) -> Arc<T> {
        self.slot.get().cloned().unwrap_or_else(|| {
            panic!(
                "dependency of type `{}` is not wired",
                std::any::type_name::<T>()
            )
        })
    }

    pub fn is_wired(&self) -> bool {
        self.slot.get().is_some()
    }

    pub(crate) fn fill(&self, value: Arc<T>) -> bool {
        self.slot.set(value).is_ok()
    }
}

impl<T: ?Sized> Clone for Dep<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: ?Sized> Default for Dep<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Dep<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dep<{}>({})",
            std::any::type_name::<T>(),
            if self.is_wired() { "wired" } else { "empty" }
        )
    }
}

/// An object that can live in the graph.
///
/// `wire` is the object's dependency manifest: one resolver call per
/// dependent field. `init` and `close` are lifecycle callbacks invoked in
/// dependency order and reverse dependency order respectively; all three
/// default to no-ops.
pub trait Inject: Any + Send + Sync {
    fn wire(&self, _resolver: &mut Resolver<'_>) -> Result<(), InjectError> {
        Ok(())
    }

    fn init(&self) {}

    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dep_fill_once() {
        let dep: Dep<u32> = Dep::new();
        assert!(!dep.is_wired());
        assert!(dep.fill(Arc::new(1)));
        assert!(!dep.fill(Arc::new(2)));
        assert_eq!(*dep.get(), 1);
    }

    #[test]
    fn test_dep_clone_shares_slot() {
        let dep: Dep<&'static str> = Dep::new();
        let other = dep.clone();
        dep.fill(Arc::new("shared"));
        assert_eq!(*other.get(), "shared");
    }

    #[test]
    #[should_panic(expected = "is not wired")]
    fn test_dep_get_unwired_panics() {
        let dep: Dep<u32> = Dep::new();
        dep.get();
    }
}
