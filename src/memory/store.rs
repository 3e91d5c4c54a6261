//! The memory store: add, search, list, and forget scoped records.
//!
//! Retrieval is always best-effort. Similarity search runs through the
//! [`VectorIndex`]; if the index fails, the store degrades to a bounded
//! keyword scan ordered by importance. Read paths never return errors —
//! the worst outcome is an empty result set.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::compress::{compress, decompress};
use crate::embed::embed;
use crate::error::{MemoryResult, StoreError};
use crate::store::Store;

use super::index::{LinearIndex, VectorIndex};
use super::{MemoryHit, MemoryRecord, MemoryScope, MemoryType, Preference, now_secs};

/// Similarity floor for search hits. The lexical embedding is sparse, so
/// low values are meaningful overlap, not noise.
pub const SIMILARITY_THRESHOLD: f32 = 0.1;

/// Cap on records examined by the keyword fallback scan.
const FALLBACK_SCAN_LIMIT: usize = 500;

fn record_key(id: u64) -> String {
    format!("mem:{id:020}")
}

fn pref_key(user_id: &str, key: &str) -> String {
    format!("pref:{user_id}:{key}")
}

/// Scoped memory with similarity and keyword search.
pub struct MemoryStore {
    store: Arc<Store>,
    records: DashMap<u64, MemoryRecord>,
    preferences: DashMap<(String, String), Preference>,
    index: Arc<dyn VectorIndex>,
    next_id: AtomicU64,
}

impl MemoryStore {
    /// Create a memory store with the default in-process [`LinearIndex`],
    /// hydrating existing records from the backing store.
    pub fn new(store: Arc<Store>) -> MemoryResult<Self> {
        Self::with_index(store, Arc::new(LinearIndex::new()))
    }

    /// Create a memory store with an injected similarity index.
    pub fn with_index(store: Arc<Store>, index: Arc<dyn VectorIndex>) -> MemoryResult<Self> {
        let records = DashMap::new();
        let preferences = DashMap::new();
        let mut max_id = 0u64;

        for (key, bytes) in store.scan_prefix("mem:")? {
            match bincode::deserialize::<MemoryRecord>(&bytes) {
                Ok(record) => {
                    max_id = max_id.max(record.id);
                    if let Err(e) = index.insert(record.id, &record.embedding) {
                        tracing::warn!(id = record.id, error = %e, "failed to index memory record");
                    }
                    records.insert(record.id, record);
                }
                Err(e) => {
                    tracing::warn!(key = key.as_str(), error = %e, "skipping unreadable memory row");
                }
            }
        }

        for (key, bytes) in store.scan_prefix("pref:")? {
            match bincode::deserialize::<Preference>(&bytes) {
                Ok(pref) => {
                    preferences.insert((pref.user_id.clone(), pref.key.clone()), pref);
                }
                Err(e) => {
                    tracing::warn!(key = key.as_str(), error = %e, "skipping unreadable preference row");
                }
            }
        }

        Ok(Self {
            store,
            records,
            preferences,
            index,
            next_id: AtomicU64::new(max_id + 1),
        })
    }

    /// Persist a new memory record, returning its id.
    ///
    /// Importance is clamped to [0.0, 1.0]; content is compressed and
    /// embedded. Malformed input never fails — only storage unavailability
    /// does.
    pub fn add_memory(
        &self,
        scope: MemoryScope,
        memory_type: MemoryType,
        content: &str,
        importance: f32,
        context: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> MemoryResult<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = now_secs();
        let record = MemoryRecord {
            id,
            scope,
            memory_type,
            content: compress(content)?,
            context,
            importance: importance.clamp(0.0, 1.0),
            access_count: 0,
            embedding: embed(content),
            created_at: now,
            last_accessed: now,
        };

        self.persist_record(&record)?;
        if let Err(e) = self.index.insert(id, &record.embedding) {
            // The record is durable; a degraded index only affects recall.
            tracing::warn!(id, error = %e, "failed to index new memory record");
        }
        self.records.insert(id, record);
        Ok(id)
    }

    /// Similarity search within a scope.
    ///
    /// Uses the vector index when it is healthy; on index failure, falls back
    /// to a bounded scan ordered by importance and filtered by
    /// case-insensitive substring containment. Every returned hit bumps the
    /// record's access counter (best-effort).
    pub fn search_memory(&self, scope: &MemoryScope, query: &str, limit: usize) -> Vec<MemoryHit> {
        let query_vec = embed(query);

        // Oversample: the index is scope-blind, so fetch extra and filter.
        let hits = match self
            .index
            .search(&query_vec, SIMILARITY_THRESHOLD, limit.saturating_mul(4))
        {
            Ok(ranked) => {
                let mut hits = Vec::new();
                for (id, similarity) in ranked {
                    let Some(record) = self.records.get(&id) else {
                        continue;
                    };
                    if record.scope != *scope {
                        continue;
                    }
                    if let Some(hit) = self.hydrate(&record, Some(similarity)) {
                        hits.push(hit);
                    }
                    if hits.len() >= limit {
                        break;
                    }
                }
                hits
            }
            Err(e) => {
                tracing::warn!(error = %e, "vector index failed, using keyword fallback");
                self.fallback_scan(scope, query, limit)
            }
        };

        for hit in &hits {
            self.touch(hit.id);
        }
        hits
    }

    /// Bounded keyword scan: importance-ordered, case-insensitive substring
    /// match of `query` in the record content.
    ///
    /// The scan bound is applied after ordering by importance, so the
    /// records examined are always the most important ones in scope.
    fn fallback_scan(&self, scope: &MemoryScope, query: &str, limit: usize) -> Vec<MemoryHit> {
        let needle = query.to_lowercase();
        let mut in_scope: Vec<(f32, u64)> = self
            .records
            .iter()
            .filter(|record| record.scope == *scope)
            .map(|record| (record.importance, record.id))
            .collect();
        in_scope.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        in_scope
            .into_iter()
            .take(FALLBACK_SCAN_LIMIT)
            .filter_map(|(_, id)| {
                let record = self.records.get(&id)?;
                self.hydrate(&record, None)
            })
            .filter(|hit| hit.content.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }

    /// The most recently created records in a scope.
    pub fn get_recent(&self, scope: &MemoryScope, limit: usize) -> Vec<MemoryHit> {
        let mut rows: Vec<(u64, MemoryHit)> = self
            .records
            .iter()
            .filter(|record| record.scope == *scope)
            .filter_map(|record| {
                self.hydrate(&record, None)
                    .map(|hit| (record.created_at, hit))
            })
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        rows.into_iter().map(|(_, hit)| hit).take(limit).collect()
    }

    /// The most frequently accessed records in a scope.
    pub fn get_most_accessed(&self, scope: &MemoryScope, limit: usize) -> Vec<MemoryHit> {
        let mut rows: Vec<(u64, MemoryHit)> = self
            .records
            .iter()
            .filter(|record| record.scope == *scope)
            .filter_map(|record| {
                self.hydrate(&record, None)
                    .map(|hit| (record.access_count, hit))
            })
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        rows.into_iter().map(|(_, hit)| hit).take(limit).collect()
    }

    /// Upsert a preference, unique on `(user_id, key)`.
    pub fn set_preference(
        &self,
        user_id: &str,
        key: &str,
        value: serde_json::Value,
        confidence: f32,
        learned_from: Option<String>,
    ) -> MemoryResult<()> {
        let pref = Preference {
            user_id: user_id.to_string(),
            key: key.to_string(),
            value,
            confidence: confidence.clamp(0.0, 1.0),
            learned_from,
            updated_at: now_secs(),
        };
        let bytes = bincode::serialize(&pref).map_err(|e| StoreError::Serialization {
            message: format!("failed to serialize preference: {e}"),
        })?;
        self.store.put(&pref_key(user_id, key), &bytes)?;
        self.preferences
            .insert((user_id.to_string(), key.to_string()), pref);
        Ok(())
    }

    /// Read a single preference value.
    pub fn get_preference(&self, user_id: &str, key: &str) -> Option<serde_json::Value> {
        self.preferences
            .get(&(user_id.to_string(), key.to_string()))
            .map(|p| p.value.clone())
    }

    /// All preferences for a user.
    pub fn get_all_preferences(&self, user_id: &str) -> Vec<Preference> {
        let mut prefs: Vec<Preference> = self
            .preferences
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        prefs.sort_by(|a, b| a.key.cmp(&b.key));
        prefs
    }

    /// Hard-delete a user-scoped record. Returns whether a record owned by
    /// that user was removed. Universal records cannot be deleted.
    pub fn delete_memory(&self, scope: &MemoryScope, id: u64) -> bool {
        let MemoryScope::User(_) = scope else {
            return false;
        };
        let owned = self
            .records
            .get(&id)
            .map(|record| record.scope == *scope)
            .unwrap_or(false);
        if !owned {
            return false;
        }

        self.records.remove(&id);
        self.index.remove(id);
        if let Err(e) = self.store.remove(&record_key(id)) {
            tracing::warn!(id, error = %e, "failed to remove memory row from store");
        }
        true
    }

    /// Number of records currently cached.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw access count for a record (introspection and tests).
    pub fn access_count(&self, id: u64) -> Option<u64> {
        self.records.get(&id).map(|r| r.access_count)
    }

    /// Stored importance for a record (introspection and tests).
    pub fn importance(&self, id: u64) -> Option<f32> {
        self.records.get(&id).map(|r| r.importance)
    }

    fn hydrate(&self, record: &MemoryRecord, similarity: Option<f32>) -> Option<MemoryHit> {
        match decompress(&record.content) {
            Ok(content) => Some(MemoryHit {
                id: record.id,
                memory_type: record.memory_type,
                content,
                importance: record.importance,
                similarity,
            }),
            Err(e) => {
                tracing::warn!(id = record.id, error = %e, "skipping undecodable memory content");
                None
            }
        }
    }

    /// Bump access stats for a returned hit. Failures are swallowed —
    /// retrieval must never fail because bookkeeping did.
    fn touch(&self, id: u64) {
        let Some(mut record) = self.records.get_mut(&id) else {
            return;
        };
        record.access_count += 1;
        record.last_accessed = now_secs();
        let snapshot = record.clone();
        drop(record);

        if let Err(e) = self.persist_record(&snapshot) {
            tracing::debug!(id, error = %e, "failed to persist access-count update");
        }
    }

    fn persist_record(&self, record: &MemoryRecord) -> MemoryResult<()> {
        let bytes = bincode::serialize(record).map_err(|e| StoreError::Serialization {
            message: format!("failed to serialize memory record: {e}"),
        })?;
        self.store.put(&record_key(record.id), &bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("records", &self.records.len())
            .field("preferences", &self.preferences.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryError;

    fn user_scope() -> MemoryScope {
        MemoryScope::User("alice".into())
    }

    fn test_store() -> MemoryStore {
        MemoryStore::new(Arc::new(Store::memory_only())).unwrap()
    }

    #[test]
    fn add_and_search_by_similarity() {
        let mem = test_store();
        mem.add_memory(
            MemoryScope::Universal,
            MemoryType::Fact,
            "rust uses ownership for memory safety",
            0.8,
            None,
        )
        .unwrap();
        mem.add_memory(
            MemoryScope::Universal,
            MemoryType::Fact,
            "the moon orbits the earth",
            0.5,
            None,
        )
        .unwrap();

        let hits = mem.search_memory(&MemoryScope::Universal, "rust ownership", 5);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("ownership"));
        assert!(hits[0].similarity.unwrap() >= SIMILARITY_THRESHOLD);
    }

    #[test]
    fn importance_is_clamped() {
        let mem = test_store();
        let high = mem
            .add_memory(MemoryScope::Universal, MemoryType::Fact, "a", 1.7, None)
            .unwrap();
        let low = mem
            .add_memory(MemoryScope::Universal, MemoryType::Fact, "b", -0.3, None)
            .unwrap();
        assert_eq!(mem.importance(high), Some(1.0));
        assert_eq!(mem.importance(low), Some(0.0));
    }

    #[test]
    fn scopes_are_isolated() {
        let mem = test_store();
        mem.add_memory(
            MemoryScope::Universal,
            MemoryType::Fact,
            "shared login knowledge",
            0.5,
            None,
        )
        .unwrap();
        mem.add_memory(
            user_scope(),
            MemoryType::Context,
            "alice prefers dark login themes",
            0.5,
            None,
        )
        .unwrap();

        let universal = mem.search_memory(&MemoryScope::Universal, "login", 10);
        assert_eq!(universal.len(), 1);
        assert!(universal[0].content.contains("shared"));

        let user = mem.search_memory(&user_scope(), "login", 10);
        assert_eq!(user.len(), 1);
        assert!(user[0].content.contains("alice"));
    }

    #[test]
    fn search_hits_bump_access_count() {
        let mem = test_store();
        let id = mem
            .add_memory(
                MemoryScope::Universal,
                MemoryType::Fact,
                "access counting works",
                0.5,
                None,
            )
            .unwrap();

        assert_eq!(mem.access_count(id), Some(0));
        mem.search_memory(&MemoryScope::Universal, "access counting", 5);
        mem.search_memory(&MemoryScope::Universal, "access counting", 5);
        assert_eq!(mem.access_count(id), Some(2));
    }

    #[test]
    fn recent_is_creation_ordered() {
        let mem = test_store();
        let first = mem
            .add_memory(MemoryScope::Universal, MemoryType::Fact, "first", 0.5, None)
            .unwrap();
        let second = mem
            .add_memory(MemoryScope::Universal, MemoryType::Fact, "second", 0.5, None)
            .unwrap();

        let recent = mem.get_recent(&MemoryScope::Universal, 10);
        assert_eq!(recent.len(), 2);
        // Same-second creation: ids break the tie only incidentally, so just
        // check both are present and the newest is not dropped by the limit.
        let ids: Vec<u64> = recent.iter().map(|h| h.id).collect();
        assert!(ids.contains(&first) && ids.contains(&second));
        assert_eq!(mem.get_recent(&MemoryScope::Universal, 1).len(), 1);
    }

    #[test]
    fn most_accessed_ordering() {
        let mem = test_store();
        mem.add_memory(MemoryScope::Universal, MemoryType::Fact, "rarely read", 0.5, None)
            .unwrap();
        let popular = mem
            .add_memory(
                MemoryScope::Universal,
                MemoryType::Fact,
                "popular entry",
                0.5,
                None,
            )
            .unwrap();

        for _ in 0..3 {
            mem.search_memory(&MemoryScope::Universal, "popular entry", 5);
        }

        let top = mem.get_most_accessed(&MemoryScope::Universal, 1);
        assert_eq!(top[0].id, popular);
    }

    #[test]
    fn preference_upsert_and_read() {
        let mem = test_store();
        mem.set_preference("alice", "theme", serde_json::json!("dark"), 0.9, None)
            .unwrap();
        mem.set_preference(
            "alice",
            "theme",
            serde_json::json!("light"),
            0.9,
            Some("conversation".into()),
        )
        .unwrap();

        assert_eq!(
            mem.get_preference("alice", "theme"),
            Some(serde_json::json!("light"))
        );
        assert_eq!(mem.get_all_preferences("alice").len(), 1);
        assert!(mem.get_all_preferences("bob").is_empty());
    }

    #[test]
    fn delete_is_user_scoped_only() {
        let mem = test_store();
        let universal = mem
            .add_memory(MemoryScope::Universal, MemoryType::Fact, "shared", 0.5, None)
            .unwrap();
        let private = mem
            .add_memory(user_scope(), MemoryType::Context, "private", 0.5, None)
            .unwrap();

        assert!(!mem.delete_memory(&MemoryScope::Universal, universal));
        assert!(!mem.delete_memory(&MemoryScope::User("bob".into()), private));
        assert!(mem.delete_memory(&user_scope(), private));
        assert!(!mem.delete_memory(&user_scope(), private));
        assert_eq!(mem.len(), 1);
    }

    /// Index stub whose search always fails, forcing the fallback path.
    struct BrokenIndex;

    impl VectorIndex for BrokenIndex {
        fn insert(&self, _id: u64, _embedding: &[f32]) -> MemoryResult<()> {
            Ok(())
        }
        fn remove(&self, _id: u64) {}
        fn search(
            &self,
            _query: &[f32],
            _threshold: f32,
            _limit: usize,
        ) -> MemoryResult<Vec<(u64, f32)>> {
            Err(MemoryError::Index {
                message: "ann service unavailable".into(),
            })
        }
    }

    #[test]
    fn broken_index_falls_back_to_keyword_scan() {
        let mem =
            MemoryStore::with_index(Arc::new(Store::memory_only()), Arc::new(BrokenIndex)).unwrap();
        mem.add_memory(
            MemoryScope::Universal,
            MemoryType::Fact,
            "The Login Form needs validation",
            0.9,
            None,
        )
        .unwrap();
        mem.add_memory(
            MemoryScope::Universal,
            MemoryType::Fact,
            "unrelated entry",
            0.4,
            None,
        )
        .unwrap();

        let hits = mem.search_memory(&MemoryScope::Universal, "login form", 5);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("Login Form"));
        assert!(hits[0].similarity.is_none());
    }

    #[test]
    fn fallback_bound_keeps_most_important_records() {
        let mem =
            MemoryStore::with_index(Arc::new(Store::memory_only()), Arc::new(BrokenIndex)).unwrap();

        // More records than the scan bound, all low importance.
        for i in 0..(FALLBACK_SCAN_LIMIT + 10) {
            mem.add_memory(
                MemoryScope::Universal,
                MemoryType::Fact,
                &format!("filler entry {i}"),
                0.3,
                None,
            )
            .unwrap();
        }
        let target = mem
            .add_memory(
                MemoryScope::Universal,
                MemoryType::Solution,
                "the important login fix",
                1.0,
                None,
            )
            .unwrap();

        // The bound is applied after importance ordering, so the
        // high-importance record is always among those examined.
        let hits = mem.search_memory(&MemoryScope::Universal, "login fix", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, target);
    }

    #[test]
    fn hydration_from_persistent_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let id;
        {
            let store = Arc::new(Store::with_persistence(dir.path()).unwrap());
            let mem = MemoryStore::new(store).unwrap();
            id = mem
                .add_memory(
                    MemoryScope::Universal,
                    MemoryType::Solution,
                    "restart the indexer to clear the stale lock",
                    0.7,
                    None,
                )
                .unwrap();
            mem.set_preference("alice", "editor", serde_json::json!("helix"), 0.8, None)
                .unwrap();
        }

        let store = Arc::new(Store::with_persistence(dir.path()).unwrap());
        let mem = MemoryStore::new(store).unwrap();
        assert_eq!(mem.len(), 1);
        let hits = mem.search_memory(&MemoryScope::Universal, "stale lock indexer", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
        assert_eq!(
            mem.get_preference("alice", "editor"),
            Some(serde_json::json!("helix"))
        );

        // Newly added records must not reuse hydrated ids.
        let new_id = mem
            .add_memory(MemoryScope::Universal, MemoryType::Fact, "newer", 0.5, None)
            .unwrap();
        assert!(new_id > id);
    }
}
