//! Recency-ordered memo table backing the caching propagator.
//!
//! Entries live in an [`IndexMap`] ordered from least to most recently
//! used. A hit moves the entry to the back; eviction pops the front.

use std::hash::Hash;
use std::num::NonZeroUsize;

use indexmap::{Equivalent, IndexMap};

#[derive(Debug)]
pub(crate) struct LruTable<K, V> {
    entries: IndexMap<K, V>,
    capacity: Option<NonZeroUsize>,
}

impl<K: Hash + Eq, V> LruTable<K, V> {
    pub(crate) fn new(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    /// Look up `key` and mark it most recently used.
    pub(crate) fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let idx = self.entries.get_index_of(key)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);
        self.entries.get_index(last).map(|(_, v)| v)
    }

    /// Look up `key` without touching recency.
    pub(crate) fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        self.entries.get(key)
    }

    /// Insert or overwrite `key` as most recently used.
    ///
    /// Returns the entry evicted to stay within capacity, if any.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(idx) = self.entries.get_index_of(&key) {
            let last = self.entries.len() - 1;
            self.entries.move_index(idx, last);
            if let Some((_, slot)) = self.entries.get_index_mut(last) {
                *slot = value;
            }
            return None;
        }

        let evicted = match self.capacity {
            Some(cap) if self.entries.len() >= cap.get() => self.entries.shift_remove_index(0),
            _ => None,
        };
        self.entries.insert(key, value);
        evicted
    }

    /// Drop every entry for which `keep` returns false.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| keep(k));
        before - self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
