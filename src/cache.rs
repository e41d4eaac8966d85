//! Per-resolver value cache
//!
//! Maps `(store key, tag)` to the fetched value. The cache is append-only:
//! entries are never evicted or overwritten for the lifetime of the owning
//! resolver, which is what makes repeated resolve calls observationally
//! transparent. Forcing a re-fetch means creating a new resolver.

use crate::value::Value;
use std::collections::HashMap;

/// Append-only map from `(store key, tag)` to fetched value
#[derive(Debug, Default)]
pub struct ValueCache {
    entries: HashMap<(String, String), Value>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached value
    pub fn get(&self, store: &str, tag: &str) -> Option<&Value> {
        self.entries.get(&(store.to_string(), tag.to_string()))
    }

    pub fn contains(&self, store: &str, tag: &str) -> bool {
        self.entries
            .contains_key(&(store.to_string(), tag.to_string()))
    }

    /// Insert a fetched value. A key that is already present keeps its
    /// original value: the first fetch wins, per the append-only contract.
    pub fn insert(&mut self, store: impl Into<String>, tag: impl Into<String>, value: Value) {
        self.entries
            .entry((store.into(), tag.into()))
            .or_insert(value);
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Scalar;

    #[test]
    fn test_get_and_contains() {
        let mut cache = ValueCache::new();
        cache.insert("value_store", "A1", Value::from(2i64));

        assert!(cache.contains("value_store", "A1"));
        assert_eq!(
            cache.get("value_store", "A1"),
            Some(&Value::Scalar(Scalar::Int(2)))
        );
        assert!(!cache.contains("value_store", "B2"));
        assert!(!cache.contains("hourly", "A1"));
    }

    #[test]
    fn test_entries_are_never_overwritten() {
        let mut cache = ValueCache::new();
        cache.insert("value_store", "A1", Value::from(2i64));
        cache.insert("value_store", "A1", Value::from(99i64));

        assert_eq!(
            cache.get("value_store", "A1"),
            Some(&Value::Scalar(Scalar::Int(2)))
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_same_tag_under_different_stores() {
        let mut cache = ValueCache::new();
        cache.insert("value_store", "A1", Value::from(1i64));
        cache.insert("hourly", "A1", Value::from(2i64));

        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.get("hourly", "A1"),
            Some(&Value::Scalar(Scalar::Int(2)))
        );
    }
}
