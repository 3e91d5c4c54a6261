//! ACID-durable key-value store backed by redb.
//!
//! Holds every row that must survive restarts: memory records, preferences,
//! skills, knowledge nodes and edges, and id-allocator checkpoints. All
//! writes go through transactions; reads use MVCC snapshots.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{StoreError, StoreResult};

/// Single table for all rows (namespaced string keys → binary values).
const ROWS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("rows");

/// ACID-durable store using redb.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("noema.redb");
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Ensure the table exists so reads on a fresh database don't fail.
        let txn = db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        txn.open_table(ROWS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Store a key-value pair with full ACID guarantees.
    pub fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        {
            let mut table = txn.open_table(ROWS_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            table.insert(key, value).map_err(|e| StoreError::Redb {
                message: format!("insert failed: {e}"),
            })?;
        }
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        Ok(())
    }

    /// Read a value by key. Returns `Ok(None)` if the key doesn't exist.
    pub fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(ROWS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        let result = table.get(key).map_err(|e| StoreError::Redb {
            message: format!("get failed: {e}"),
        })?;
        Ok(result.map(|guard| guard.value().to_vec()))
    }

    /// Delete a key. Returns whether the key existed.
    pub fn remove(&self, key: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        let existed = {
            let mut table = txn.open_table(ROWS_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            let result = table.remove(key).map_err(|e| StoreError::Redb {
                message: format!("remove failed: {e}"),
            })?;
            result.is_some()
        };
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        Ok(existed)
    }

    /// Scan all `(key, value)` pairs whose key starts with `prefix`.
    pub fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(ROWS_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;

        let mut rows = Vec::new();
        let iter = table.range(prefix..).map_err(|e| StoreError::Redb {
            message: format!("range failed: {e}"),
        })?;
        for entry in iter {
            let (key, value) = entry.map_err(|e| StoreError::Redb {
                message: format!("iteration failed: {e}"),
            })?;
            let key = key.value().to_string();
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key, value.value().to_vec()));
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fresh_database_reads_are_empty() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        // No writes yet: reads must succeed and come back empty.
        assert_eq!(store.get("mem:1").unwrap(), None);
        assert!(store.scan_prefix("mem:").unwrap().is_empty());
        assert!(!store.remove("mem:1").unwrap());
    }

    #[test]
    fn put_get_remove() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        store.put("hello", b"world").unwrap();
        assert_eq!(store.get("hello").unwrap(), Some(b"world".to_vec()));

        assert!(store.remove("hello").unwrap());
        assert_eq!(store.get("hello").unwrap(), None);
        assert!(!store.remove("hello").unwrap());
    }

    #[test]
    fn overwrite_value() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        store.put("key", b"val1").unwrap();
        store.put("key", b"val2").unwrap();
        assert_eq!(store.get("key").unwrap(), Some(b"val2".to_vec()));
    }

    #[test]
    fn persistence_across_reopens() {
        let dir = TempDir::new().unwrap();

        {
            let store = DurableStore::open(dir.path()).unwrap();
            store.put("persist_key", b"persist_val").unwrap();
        }

        let store = DurableStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get("persist_key").unwrap(),
            Some(b"persist_val".to_vec())
        );
    }

    #[test]
    fn scan_prefix_is_bounded() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        store.put("mem:00000001", b"a").unwrap();
        store.put("mem:00000002", b"b").unwrap();
        store.put("pref:alice:theme", b"c").unwrap();
        store.put("skill:parse", b"d").unwrap();

        let rows = store.scan_prefix("mem:").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|(k, _)| k.starts_with("mem:")));
    }
}
