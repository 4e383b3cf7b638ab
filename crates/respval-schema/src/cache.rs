//! # Compiled-Validator Cache
//!
//! Memoizes compiled [`jsonschema::Validator`]s keyed by the JSON text of
//! their schema. `serde_json` maps keep keys sorted, so structurally equal
//! schemas always produce the same key.
//!
//! The cache is bounded. When full, the entry inserted first is evicted
//! (insertion order, not least-recently-used). It is pure memoization: a
//! race between two threads compiling the same schema costs one redundant
//! compilation and nothing else, so compilation happens outside the lock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use jsonschema::Validator;
use parking_lot::Mutex;

/// Hit/miss counters and current occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that required a compilation.
    pub misses: u64,
    /// Entries dropped to respect the capacity.
    pub evictions: u64,
    /// Entries currently held.
    pub len: usize,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Arc<Validator>>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Bounded, thread-safe cache of compiled validators.
pub struct ValidationCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for ValidationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ValidationCache {
    /// Create a cache holding at most `capacity` validators (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` is cached. Does not count as a hit.
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        *self.state.lock() = CacheState::default();
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            len: state.entries.len(),
        }
    }

    /// Return the validator cached under `key`, compiling it with `compile`
    /// on a miss.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `compile`. Failed compilations are
    /// not cached.
    pub fn get_or_try_insert<E>(
        &self,
        key: String,
        compile: impl FnOnce() -> Result<Validator, E>,
    ) -> Result<Arc<Validator>, E> {
        {
            let mut state = self.state.lock();
            if let Some(found) = state.entries.get(&key).cloned() {
                state.hits += 1;
                return Ok(found);
            }
            state.misses += 1;
        }

        let compiled = Arc::new(compile()?);

        let mut state = self.state.lock();
        if let Some(raced) = state.entries.get(&key) {
            return Ok(Arc::clone(raced));
        }
        while state.entries.len() >= self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
            state.evictions += 1;
            tracing::debug!(capacity = self.capacity, "evicted oldest compiled validator");
        }
        state.order.push_back(key.clone());
        state.entries.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }
}
