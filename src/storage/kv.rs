use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Durable string key/value storage that outlives a process.
///
/// A missing key is the initial state, not an error. Implementations that can
/// fail internally (disk, sqlite) log the failure and behave as if the key were
/// absent, so callers never have to handle storage errors.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    /// Remove every key starting with `prefix`.
    fn remove_prefix(&self, prefix: &str);
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }

    fn remove_prefix(&self, prefix: &str) {
        (**self).remove_prefix(prefix)
    }
}

/// Process-local store, used in tests and when no database path is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn remove_prefix(&self, prefix: &str) {
        self.entries.lock().retain(|key, _| !key.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_basic_ops() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a"), None);

        store.set("a", "1");
        store.set("a", "2");
        assert_eq!(store.get("a").as_deref(), Some("2"));

        store.remove("a");
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_prefix_keeps_other_keys() {
        let store = MemoryStore::new();
        store.set("action:groups", "1");
        store.set("action:people", "2");
        store.set("read:g1", "3");

        store.remove_prefix("action:");

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("read:g1").as_deref(), Some("3"));
    }

    #[test]
    fn test_arc_store_shares_entries() {
        let store = Arc::new(MemoryStore::new());
        let handle = Arc::clone(&store);

        handle.set("k", "v");
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }
}
