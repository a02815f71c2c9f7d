//! Table of units by logical path.
//!
//! Units are created lazily and exactly once per path: a read-locked lookup
//! first, then the write lock, a second lookup and the insert. The table only
//! shrinks through explicit removal or [`Registry::teardown_all`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::unit::Unit;

#[derive(Debug, Default)]
pub struct Registry {
    units: RwLock<FxHashMap<String, Arc<Unit>>>,
    created: AtomicUsize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Arc<Unit>> {
        self.units.read().get(path).cloned()
    }

    /// Unit for `path`, built with `create` if none exists yet.
    ///
    /// `create` runs at most once per path, under the registry write lock.
    pub fn get_or_create(&self, path: &str, create: impl FnOnce() -> Unit) -> Arc<Unit> {
        if let Some(unit) = self.units.read().get(path) {
            return unit.clone();
        }

        let mut units = self.units.write();
        if let Some(unit) = units.get(path) {
            return unit.clone();
        }
        let unit = Arc::new(create());
        units.insert(path.to_string(), unit.clone());
        self.created.fetch_add(1, Ordering::Relaxed);
        crate::debug!("registry"; "created {} unit {}", unit.kind().name(), path);
        unit
    }

    /// Forget a unit. Its type and instance are released.
    pub fn remove(&self, path: &str) -> Option<Arc<Unit>> {
        let unit = self.units.write().remove(path)?;
        unit.release();
        Some(unit)
    }

    /// Clear the table, releasing every unit's type, instance and loader.
    ///
    /// Returns the number of units released.
    pub fn teardown_all(&self) -> usize {
        let units: Vec<Arc<Unit>> = self.units.write().drain().map(|(_, u)| u).collect();
        for unit in &units {
            unit.release();
        }
        units.len()
    }

    /// All units, in no particular order.
    pub fn units(&self) -> Vec<Arc<Unit>> {
        self.units.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.units.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.read().is_empty()
    }

    /// Units constructed over the registry's lifetime.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UnitKind;
    use std::sync::Barrier;
    use std::thread;

    fn unit(path: &str) -> Unit {
        Unit::new(path, UnitKind::Page, format!("gen{}", path.replace('/', ".")))
    }

    #[test]
    fn test_get_or_create_once() {
        let registry = Registry::new();
        let a = registry.get_or_create("/a", || unit("/a"));
        let b = registry.get_or_create("/a", || panic!("created twice"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.created(), 1);
    }

    #[test]
    fn test_concurrent_first_access_creates_one_unit() {
        let registry = Registry::new();
        let barrier = Barrier::new(16);
        let constructed = AtomicUsize::new(0);

        let units: Vec<Arc<Unit>> = thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        registry.get_or_create("/hot", || {
                            constructed.fetch_add(1, Ordering::SeqCst);
                            unit("/hot")
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert!(units.iter().all(|u| Arc::ptr_eq(u, &units[0])));
    }

    #[test]
    fn test_remove_and_teardown() {
        let registry = Registry::new();
        registry.get_or_create("/a", || unit("/a"));
        registry.get_or_create("/b", || unit("/b"));
        registry.get_or_create("/c", || unit("/c"));

        assert!(registry.remove("/a").is_some());
        assert!(registry.get("/a").is_none());
        assert_eq!(registry.teardown_all(), 2);
        assert!(registry.is_empty());

        // A fresh unit after teardown
        registry.get_or_create("/b", || unit("/b"));
        assert_eq!(registry.created(), 4);
    }
}
