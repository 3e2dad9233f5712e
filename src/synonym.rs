use std::{
    fmt::Debug,
    hash::Hash,
    mem,
};

use ahash::AHashMap;

/// A map where several keys may name the same value.
///
/// Every value has one canonical key; any number of synonyms point at a
/// canonical key. Lookups accept either.
#[derive(Clone, PartialEq, Eq)]
pub struct SynonymMap<K: Eq + Hash, V> {
    vals: AHashMap<K, V>,
    syns: AHashMap<K, K>,
}

impl<K: Eq + Hash, V> Default for SynonymMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> SynonymMap<K, V> {
    pub fn new() -> SynonymMap<K, V> {
        SynonymMap {
            vals: AHashMap::new(),
            syns: AHashMap::new(),
        }
    }

    /// Points `from` at the canonical key `to`, which must already be present.
    /// Returns false if `from` was already a synonym.
    #[inline]
    pub fn insert_synonym(&mut self, from: K, to: K) -> bool {
        assert!(self.vals.contains_key(&to));
        self.syns.insert(from, to).is_none()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.vals.iter()
    }

    #[inline]
    pub fn find(&self, k: &K) -> Option<&V> {
        self.with_key(k, |k| self.vals.get(k))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vals.len()
    }

    #[inline]
    fn with_key<T, F>(&self, k: &K, with: F) -> T
    where
        F: FnOnce(&K) -> T,
    {
        match self.syns.get(k) {
            Some(canonical) => with(canonical),
            None => with(k),
        }
    }
}

impl<K: Eq + Hash + Clone, V> SynonymMap<K, V> {
    #[inline]
    pub fn find_mut<'a>(&'a mut self, k: &K) -> Option<&'a mut V> {
        match self.syns.get(k) {
            Some(canonical) => self.vals.get_mut(canonical),
            None => self.vals.get_mut(k),
        }
    }

    /// Replaces the value under `k` (or the key it is a synonym of).
    #[inline]
    pub fn swap(&mut self, k: K, mut new: V) -> Option<V> {
        match self.find_mut(&k) {
            Some(old) => {
                mem::swap(old, &mut new);
                Some(new)
            }
            None => self.vals.insert(k, new),
        }
    }

    /// Returns false if the key was already present.
    #[inline]
    pub fn insert(&mut self, k: K, v: V) -> bool {
        self.swap(k, v).is_none()
    }
}

impl<K: Eq + Hash + Debug, V: Debug> Debug for SynonymMap<K, V> {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        self.vals.fmt(f)?;
        write!(f, " (synonyms: {:?})", self.syns)
    }
}
