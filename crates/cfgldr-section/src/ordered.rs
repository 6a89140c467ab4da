//! Insertion-ordered string-keyed container.

use indexmap::IndexMap;
use indexmap::map::{IntoIter, Iter, IterMut};

/// A string-keyed map that iterates in first-insertion order.
///
/// Overwriting a key keeps its position, removing a key keeps the relative
/// order of the others, and two maps are only equal when they hold the same
/// entries in the same order.
#[derive(Debug, Clone)]
pub struct OrderedMap<V> {
    inner: IndexMap<String, V>,
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        OrderedMap {
            inner: IndexMap::new(),
        }
    }

    /// Insert or overwrite in place, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.inner.insert(key.into(), value)
    }

    /// The value at `key`, inserting `default()` at the end when absent.
    pub fn get_or_insert_with(
        &mut self,
        key: impl Into<String>,
        default: impl FnOnce() -> V,
    ) -> &mut V {
        self.inner.entry(key.into()).or_insert_with(default)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.inner.shift_remove(key)
    }

    /// Keep only the entries for which `keep` returns true, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &mut V) -> bool) {
        self.inner.retain(|k, v| keep(k, v));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }

    pub fn iter(&self) -> Iter<'_, String, V> {
        self.inner.iter()
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, String, V> {
        self.inner.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: PartialEq> PartialEq for OrderedMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<V: Eq> Eq for OrderedMap<V> {}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        OrderedMap {
            inner: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = IntoIter<String, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<'a, V> IntoIterator for &'a OrderedMap<V> {
    type Item = (&'a String, &'a V);
    type IntoIter = Iter<'a, String, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}
