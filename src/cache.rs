//! Memoisation table for diagram operations.
//!
//! A thin wrapper over [`HashMap`]: no collisions, grows as needed, and
//! counts hits and misses so the manager can report cache efficiency.

use std::cell::Cell;
use std::collections::HashMap;
use std::hash::Hash;

pub struct Cache<K, V> {
    map: HashMap<K, V>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new(14)
    }
}

impl<K, V> Cache<K, V> {
    /// Create a new cache with room for `2^bits` entries before reallocating.
    pub fn new(bits: usize) -> Self {
        Self {
            map: HashMap::with_capacity(1 << bits),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Get the number of cache hits.
    pub fn hits(&self) -> usize {
        self.hits.get()
    }
    /// Get the number of cache misses.
    pub fn misses(&self) -> usize {
        self.misses.get()
    }
}

impl<K: Hash + Eq, V> Cache<K, V> {
    /// Get the cached result.
    pub fn get(&self, key: &K) -> Option<&V> {
        let res = self.map.get(key);
        if res.is_some() {
            self.hits.set(self.hits.get() + 1);
        } else {
            self.misses.set(self.misses.get() + 1);
        }
        res
    }

    /// Insert a result into the cache.
    pub fn insert(&mut self, key: K, value: V) {
        self.map.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache() {
        let mut cache = Cache::<(u64, u64), i32>::new(3);

        cache.insert((1, 2), 3);
        cache.insert((2, 3), 1);

        assert_eq!(cache.get(&(1, 2)), Some(&3));
        assert_eq!(cache.get(&(2, 3)), Some(&1));
        assert_eq!(cache.get(&(2, 1)), None);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 2);
    }
}
