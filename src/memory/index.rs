//! Similarity index seam for memory search.
//!
//! [`VectorIndex`] is the boundary between the memory store and whatever
//! provides approximate-nearest-neighbor search. The in-process
//! [`LinearIndex`] does an exact cosine scan — adequate for the sparse
//! lexical embeddings this crate produces, and unlike an HNSW index it
//! supports removal, which `delete_memory` needs. A failing index never
//! breaks retrieval: the store degrades to a keyword scan.

use dashmap::DashMap;

use crate::embed::cosine;
use crate::error::MemoryResult;

/// Approximate-nearest-neighbor search over record embeddings.
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the embedding for a record.
    fn insert(&self, id: u64, embedding: &[f32]) -> MemoryResult<()>;

    /// Remove a record's embedding. Unknown ids are a no-op.
    fn remove(&self, id: u64);

    /// Ranked `(id, similarity)` pairs with similarity ≥ `threshold`,
    /// best first, at most `limit`.
    fn search(&self, query: &[f32], threshold: f32, limit: usize)
    -> MemoryResult<Vec<(u64, f32)>>;
}

/// Exact cosine scan over all stored embeddings.
#[derive(Debug, Default)]
pub struct LinearIndex {
    vectors: DashMap<u64, Vec<f32>>,
}

impl LinearIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl VectorIndex for LinearIndex {
    fn insert(&self, id: u64, embedding: &[f32]) -> MemoryResult<()> {
        self.vectors.insert(id, embedding.to_vec());
        Ok(())
    }

    fn remove(&self, id: u64) {
        self.vectors.remove(&id);
    }

    fn search(
        &self,
        query: &[f32],
        threshold: f32,
        limit: usize,
    ) -> MemoryResult<Vec<(u64, f32)>> {
        let mut hits: Vec<(u64, f32)> = self
            .vectors
            .iter()
            .map(|entry| (*entry.key(), cosine(query, entry.value())))
            .filter(|(_, sim)| *sim >= threshold)
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::embed;

    #[test]
    fn search_finds_closest_first() {
        let index = LinearIndex::new();
        index.insert(1, &embed("fix the login form")).unwrap();
        index.insert(2, &embed("deploy the service")).unwrap();
        index.insert(3, &embed("login form validation fix")).unwrap();

        let hits = index.search(&embed("login form"), 0.1, 10).unwrap();
        assert!(!hits.is_empty());
        assert!(hits[0].0 == 1 || hits[0].0 == 3);
        for window in hits.windows(2) {
            assert!(window[0].1 >= window[1].1);
        }
    }

    #[test]
    fn threshold_filters_unrelated() {
        let index = LinearIndex::new();
        index.insert(1, &embed("orbital mechanics")).unwrap();

        let hits = index.search(&embed("login form"), 0.1, 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn limit_is_respected() {
        let index = LinearIndex::new();
        for i in 0..20 {
            index.insert(i, &embed("login form bug")).unwrap();
        }
        let hits = index.search(&embed("login form"), 0.1, 5).unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn remove_drops_record() {
        let index = LinearIndex::new();
        index.insert(1, &embed("login form")).unwrap();
        index.remove(1);
        assert!(index.is_empty());
        let hits = index.search(&embed("login form"), 0.1, 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn zero_query_matches_nothing() {
        let index = LinearIndex::new();
        index.insert(1, &embed("anything at all")).unwrap();
        let hits = index.search(&embed(""), 0.1, 10).unwrap();
        assert!(hits.is_empty());
    }
}
