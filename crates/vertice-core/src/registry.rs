//! Name-keyed plugin registry.
//!
//! Provisioners, routers and repository managers are all looked up by the
//! name carried on a box or carton record. Registration normally happens
//! once at startup; lookups happen on every operation. Reads load an
//! immutable snapshot through `ArcSwap` and never block. Writers take a
//! mutex, copy the current map, and publish the new one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

pub struct Registry<T: ?Sized> {
    entries: ArcSwap<HashMap<String, Arc<T>>>,
    write_lock: Mutex<()>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Insert `item` under `name`. An existing entry is replaced silently
    /// and returned.
    pub fn register(&self, name: impl Into<String>, item: Arc<T>) -> Option<Arc<T>> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = HashMap::clone(&self.entries.load());
        let previous = next.insert(name.into(), item);
        self.entries.store(Arc::new(next));
        previous
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<T>> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = HashMap::clone(&self.entries.load());
        let removed = next.remove(name);
        if removed.is_some() {
            self.entries.store(Arc::new(next));
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries.load().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.load().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.load().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Drop every entry. Used on shutdown and between tests.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.entries.store(Arc::new(HashMap::new()));
    }
}
