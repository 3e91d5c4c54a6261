//! Tiered storage for noema.
//!
//! Two tiers serve different needs:
//!
//! - [`MemStore`] — hot rows in concurrent hashmaps (DashMap)
//! - [`DurableStore`] — persistent rows in ACID transactions (redb)
//!
//! [`Store`] composes them: writes go to the hot tier and through to the
//! durable tier when one is configured; subsystems hydrate their caches from
//! `scan_prefix` at startup. Keys are namespaced strings — `mem:`, `pref:`,
//! `skill:`, `node:`, `edge:`, `meta:`.

pub mod durable;
pub mod mem;

pub use durable::DurableStore;
pub use mem::MemStore;

use crate::error::StoreResult;

/// Composable store: hot (mem) with optional durable write-through.
pub struct Store {
    hot: MemStore,
    durable: Option<DurableStore>,
}

impl Store {
    /// Create a memory-only store (no persistence).
    pub fn memory_only() -> Self {
        Self {
            hot: MemStore::new(),
            durable: None,
        }
    }

    /// Create a store with durable persistence in the given directory.
    pub fn with_persistence(data_dir: &std::path::Path) -> StoreResult<Self> {
        let durable = DurableStore::open(data_dir)?;
        Ok(Self {
            hot: MemStore::new(),
            durable: Some(durable),
        })
    }

    /// Whether this store persists across restarts.
    pub fn is_persistent(&self) -> bool {
        self.durable.is_some()
    }

    /// Write a row to the hot tier and through to the durable tier.
    ///
    /// The durable write is the one that can fail; the hot write cannot.
    pub fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.hot.put(key, value.to_vec());
        match &self.durable {
            Some(d) => d.put(key, value),
            None => Ok(()),
        }
    }

    /// Read a row, checking hot first, then durable (promoting on hit).
    pub fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        if let Some(v) = self.hot.get(key) {
            return Ok(Some(v));
        }
        if let Some(durable) = &self.durable {
            if let Some(v) = durable.get(key)? {
                self.hot.put(key, v.clone());
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    /// Remove a row from both tiers. Returns whether it existed in either.
    pub fn remove(&self, key: &str) -> StoreResult<bool> {
        let hot_existed = self.hot.remove(key).is_some();
        let durable_existed = match &self.durable {
            Some(d) => d.remove(key)?,
            None => false,
        };
        Ok(hot_existed || durable_existed)
    }

    /// All rows under a prefix, from the durable tier when present (it is the
    /// source of truth at startup), otherwise from the hot tier.
    pub fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        match &self.durable {
            Some(d) => d.scan_prefix(prefix),
            None => Ok(self.hot.scan_prefix(prefix)),
        }
    }

    /// Number of rows in the hot tier.
    pub fn hot_len(&self) -> usize {
        self.hot.len()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("hot_len", &self.hot.len())
            .field("persistent", &self.durable.is_some())
            .finish()
    }
}
