//! Store abstraction: injected fetch functions
//!
//! A store is whatever can turn a batch of tag identifiers into values — an
//! HTTP client wrapper, a database query, a test fixture. The engine treats
//! it as an opaque blocking call: batching below the per-resolve batch,
//! retries, timeouts and parallelism all belong inside the store function.

use crate::value::Value;
use std::collections::HashMap;

/// Key under which the mandatory default store is registered
pub const DEFAULT_STORE_KEY: &str = "value_store";

/// A named external data source
///
/// `fetch` must return a value for every requested tag; the resolver treats
/// any omission as fatal for the current resolve call. Blanket-implemented
/// for plain functions and closures.
pub trait Store {
    fn fetch(&self, tags: &[String]) -> anyhow::Result<HashMap<String, Value>>;
}

impl<F> Store for F
where
    F: Fn(&[String]) -> anyhow::Result<HashMap<String, Value>>,
{
    fn fetch(&self, tags: &[String]) -> anyhow::Result<HashMap<String, Value>> {
        self(tags)
    }
}

/// The stores configured on one resolver: a default plus zero or more named
pub struct StoreSet {
    stores: HashMap<String, Box<dyn Store>>,
}

impl StoreSet {
    /// Create a store set with the mandatory default store
    pub fn new(default: impl Store + 'static) -> Self {
        let mut stores: HashMap<String, Box<dyn Store>> = HashMap::new();
        stores.insert(DEFAULT_STORE_KEY.to_string(), Box::new(default));
        StoreSet { stores }
    }

    /// Register an additional named store, selectable per leaf via
    /// `Expr::tag_in`
    pub fn insert(&mut self, key: impl Into<String>, store: impl Store + 'static) {
        self.stores.insert(key.into(), Box::new(store));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stores.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&dyn Store> {
        self.stores.get(key).map(|s| s.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Scalar;

    fn fixed(tags: &[String]) -> anyhow::Result<HashMap<String, Value>> {
        Ok(tags
            .iter()
            .map(|t| (t.clone(), Value::Scalar(Scalar::Int(7))))
            .collect())
    }

    #[test]
    fn test_functions_are_stores() {
        let set = StoreSet::new(fixed);
        let store = set.get(DEFAULT_STORE_KEY).unwrap();

        let values = store.fetch(&["A".to_string()]).unwrap();
        assert_eq!(values.get("A"), Some(&Value::Scalar(Scalar::Int(7))));
    }

    #[test]
    fn test_named_store_lookup() {
        let mut set = StoreSet::new(fixed);
        set.insert("hourly", fixed);

        assert!(set.contains(DEFAULT_STORE_KEY));
        assert!(set.contains("hourly"));
        assert!(!set.contains("daily"));
    }
}
