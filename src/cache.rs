//! Bounded memoizing caches
//!
//! Two small building blocks used by handlers that issue expensive calls:
//!
//! - [`LastCall`] remembers the result of the most recent call, keyed by an
//!   explicit [`RangeKey`]. A hit requires a bit-identical repeat of the
//!   query; anything else is a miss and a recompute.
//! - [`LazyTable`] is an immutable lookup table populated by a single loader
//!   closure on first access.
//!
//! Both are correctness-neutral: disabling or clearing them never changes a
//! computed result.

use crate::error::Result;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

/// Exact key for a time-range query against one data source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeKey {
    source: u64,
    name: String,
    start_bits: u64,
    stop_bits: u64,
}

impl RangeKey {
    /// Key for `name` over `[tstart, tstop)` from `source`, compared
    /// bit-for-bit
    pub fn new(source: u64, name: impl Into<String>, tstart: f64, tstop: f64) -> Self {
        Self {
            source,
            name: name.into(),
            start_bits: tstart.to_bits(),
            stop_bits: tstop.to_bits(),
        }
    }
}

/// Single-entry cache of the most recent call
pub struct LastCall<K, V> {
    label: &'static str,
    enabled: bool,
    slot: Mutex<Option<(K, V)>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: PartialEq + Clone, V: Clone> LastCall<K, V> {
    /// Create a cache; a disabled cache always recomputes
    pub fn new(label: &'static str, enabled: bool) -> Self {
        Self {
            label,
            enabled,
            slot: Mutex::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, or compute and remember it.
    ///
    /// The lock is not held while `compute` runs; concurrent misses for the
    /// same key both compute and the last writer wins.
    pub fn get_or_try_insert_with<F>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if self.enabled {
            if let Ok(slot) = self.slot.lock() {
                if let Some((cached_key, value)) = slot.as_ref() {
                    if *cached_key == key {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!("{} cache hit", self.label);
                        return Ok(value.clone());
                    }
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute()?;

        if self.enabled {
            if let Ok(mut slot) = self.slot.lock() {
                *slot = Some((key, value.clone()));
            }
        }
        Ok(value)
    }

    /// Drop the cached entry
    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }

    /// Number of cache hits so far
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of cache misses so far
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl<K, V> std::fmt::Debug for LastCall<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LastCall")
            .field("label", &self.label)
            .field("enabled", &self.enabled)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

type Loader<K, V> = Box<dyn Fn() -> HashMap<K, V> + Send + Sync>;

/// Lookup table built on first access
pub struct LazyTable<K, V> {
    cell: OnceLock<HashMap<K, V>>,
    loader: Loader<K, V>,
}

impl<K: Eq + Hash, V> LazyTable<K, V> {
    /// Create an unloaded table
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> HashMap<K, V> + Send + Sync + 'static,
    {
        Self {
            cell: OnceLock::new(),
            loader: Box::new(loader),
        }
    }

    fn table(&self) -> &HashMap<K, V> {
        self.cell.get_or_init(|| (self.loader)())
    }

    /// Look up a key, loading the table if needed
    pub fn get(&self, key: &K) -> Option<&V> {
        self.table().get(key)
    }

    /// Returns true once the loader has run
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Number of entries, loading the table if needed
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns true if the loaded table has no entries
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_last_call_hit_requires_exact_key() {
        let cache: LastCall<RangeKey, Vec<f64>> = LastCall::new("test", true);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0, 2.0])
        };

        cache
            .get_or_try_insert_with(RangeKey::new(1, "a", 0.0, 10.0), compute)
            .unwrap();
        cache
            .get_or_try_insert_with(RangeKey::new(1, "a", 0.0, 10.0), compute)
            .unwrap();
        cache
            .get_or_try_insert_with(RangeKey::new(1, "a", 0.0, 10.000001), compute)
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_disabled_cache_always_computes() {
        let cache: LastCall<RangeKey, u32> = LastCall::new("test", false);
        for _ in 0..3 {
            cache
                .get_or_try_insert_with(RangeKey::new(1, "a", 0.0, 1.0), || Ok(7))
                .unwrap();
        }
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 3);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache: LastCall<RangeKey, u32> = LastCall::new("test", true);
        let key = RangeKey::new(1, "a", 0.0, 1.0);
        let err = cache.get_or_try_insert_with(key.clone(), || {
            Err(crate::error::TlmError::Model("down".into()))
        });
        assert!(err.is_err());
        assert_eq!(cache.get_or_try_insert_with(key, || Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_keys_from_different_sources_differ() {
        let cache: LastCall<RangeKey, u32> = LastCall::new("test", true);
        cache
            .get_or_try_insert_with(RangeKey::new(1, "a", 0.0, 1.0), || Ok(1))
            .unwrap();
        let other = cache
            .get_or_try_insert_with(RangeKey::new(2, "a", 0.0, 1.0), || Ok(2))
            .unwrap();
        assert_eq!(other, 2);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn test_lazy_table_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let table = LazyTable::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            HashMap::from([("a", 1), ("b", 2)])
        });

        assert!(!table.is_loaded());
        assert_eq!(table.get(&"a"), Some(&1));
        assert_eq!(table.get(&"z"), None);
        assert_eq!(table.len(), 2);
        assert!(table.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
