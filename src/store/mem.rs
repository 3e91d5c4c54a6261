//! In-memory hot storage backed by DashMap.
//!
//! Provides the fastest possible lookups for the row caches every subsystem
//! keeps warm. All data is lost on process exit unless a durable tier is
//! configured behind it.

use dashmap::DashMap;

/// Concurrent in-memory store using a sharded hashmap keyed by namespaced
/// string keys (`mem:…`, `skill:…`, `node:…`).
#[derive(Debug)]
pub struct MemStore {
    data: DashMap<String, Vec<u8>>,
}

impl MemStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Insert or replace a value.
    pub fn put(&self, key: &str, value: Vec<u8>) {
        self.data.insert(key.to_string(), value);
    }

    /// Get a clone of the stored value.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.data.get(key).map(|v| v.value().clone())
    }

    /// Check if a key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Remove a key and return its value.
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.data.remove(key).map(|(_, v)| v)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All `(key, value)` pairs under a prefix (snapshot — not a consistent
    /// view under concurrent writes).
    pub fn scan_prefix(&self, prefix: &str) -> Vec<(String, Vec<u8>)> {
        self.data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}
