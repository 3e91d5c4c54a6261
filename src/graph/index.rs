//! In-memory knowledge graph with persistence write-through.
//!
//! Uses `petgraph` for the graph structure and `DashMap` for O(1) lookups by
//! node id. Edge insertion validates both endpoints before any mutation;
//! there is no update or delete surface by design.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::compress::{compress, decompress};
use crate::error::{GraphError, GraphResult, StoreError};
use crate::store::Store;

use super::{KnowledgeEdge, KnowledgeNode, NodeView, RelatedNode};

/// Edge payload inside the petgraph structure.
#[derive(Debug, Clone)]
struct EdgeAttr {
    relation_type: String,
    weight: f32,
}

fn node_key(id: u64) -> String {
    format!("node:{id:020}")
}

fn edge_key(id: u64) -> String {
    format!("edge:{id:020}")
}

/// Append-only knowledge graph.
pub struct KnowledgeGraph {
    store: Arc<Store>,
    /// The directed structure: petgraph nodes hold our node ids.
    graph: std::sync::RwLock<DiGraph<u64, EdgeAttr>>,
    /// Node rows by id.
    nodes: DashMap<u64, KnowledgeNode>,
    /// Node id → petgraph index.
    node_index: DashMap<u64, NodeIndex>,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
    edge_count: AtomicUsize,
}

impl KnowledgeGraph {
    /// Create a graph, hydrating nodes and edges from the backing store.
    pub fn new(store: Arc<Store>) -> GraphResult<Self> {
        let graph = Self {
            store: Arc::clone(&store),
            graph: std::sync::RwLock::new(DiGraph::new()),
            nodes: DashMap::new(),
            node_index: DashMap::new(),
            next_node_id: AtomicU64::new(1),
            next_edge_id: AtomicU64::new(1),
            edge_count: AtomicUsize::new(0),
        };

        let mut max_node_id = 0u64;
        for (key, bytes) in store.scan_prefix("node:")? {
            match bincode::deserialize::<KnowledgeNode>(&bytes) {
                Ok(node) => {
                    max_node_id = max_node_id.max(node.id);
                    graph.insert_node_row(node);
                }
                Err(e) => {
                    tracing::warn!(key = key.as_str(), error = %e, "skipping unreadable node row");
                }
            }
        }
        graph.next_node_id.store(max_node_id + 1, Ordering::Relaxed);

        let mut max_edge_id = 0u64;
        for (key, bytes) in store.scan_prefix("edge:")? {
            match bincode::deserialize::<KnowledgeEdge>(&bytes) {
                Ok(edge) => {
                    max_edge_id = max_edge_id.max(edge.id);
                    if graph.link(&edge).is_err() {
                        tracing::warn!(
                            edge_id = edge.id,
                            "skipping persisted edge with missing endpoint"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(key = key.as_str(), error = %e, "skipping unreadable edge row");
                }
            }
        }
        graph.next_edge_id.store(max_edge_id + 1, Ordering::Relaxed);

        Ok(graph)
    }

    /// Add a node. Always succeeds (barring storage unavailability).
    pub fn add_node(
        &self,
        name: &str,
        node_type: &str,
        content: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> GraphResult<u64> {
        let id = self.next_node_id.fetch_add(1, Ordering::Relaxed);
        let node = KnowledgeNode {
            id,
            name: name.to_string(),
            node_type: node_type.to_string(),
            content: compress(content)?,
            metadata,
        };

        let bytes = bincode::serialize(&node).map_err(|e| StoreError::Serialization {
            message: format!("failed to serialize node: {e}"),
        })?;
        self.store.put(&node_key(id), &bytes)?;
        self.insert_node_row(node);
        Ok(id)
    }

    /// Add a directed edge between two existing nodes.
    ///
    /// Rejected without mutating the graph when either endpoint is missing.
    pub fn add_edge(
        &self,
        source_id: u64,
        target_id: u64,
        relation_type: &str,
        weight: f32,
    ) -> GraphResult<u64> {
        if !self.nodes.contains_key(&source_id) {
            return Err(GraphError::MissingEndpoint { node_id: source_id });
        }
        if !self.nodes.contains_key(&target_id) {
            return Err(GraphError::MissingEndpoint { node_id: target_id });
        }

        let id = self.next_edge_id.fetch_add(1, Ordering::Relaxed);
        let edge = KnowledgeEdge {
            id,
            source_id,
            target_id,
            relation_type: relation_type.to_string(),
            weight,
        };

        let bytes = bincode::serialize(&edge).map_err(|e| StoreError::Serialization {
            message: format!("failed to serialize edge: {e}"),
        })?;
        self.store.put(&edge_key(id), &bytes)?;
        self.link(&edge)?;
        Ok(id)
    }

    /// Find a node by name: case-insensitive exact match first, then
    /// substring containment. First hit in creation order.
    pub fn find_node_by_name(&self, name: &str) -> Option<NodeView> {
        let needle = name.to_lowercase();

        let exact = self
            .nodes
            .iter()
            .filter(|n| n.name.to_lowercase() == needle)
            .map(|n| n.id)
            .min();
        let id = exact.or_else(|| {
            self.nodes
                .iter()
                .filter(|n| n.name.to_lowercase().contains(&needle))
                .map(|n| n.id)
                .min()
        })?;

        self.nodes.get(&id).and_then(|n| self.hydrate(&n))
    }

    /// Get a node by id, hydrated.
    pub fn get_node(&self, id: u64) -> Option<NodeView> {
        self.nodes.get(&id).and_then(|n| self.hydrate(&n))
    }

    /// Outgoing relations of a node, targets hydrated.
    pub fn get_related_nodes(&self, node_id: u64) -> Vec<RelatedNode> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let Some(idx) = self.node_index.get(&node_id).map(|i| *i) else {
            return Vec::new();
        };

        graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|edge| {
                let target_id = *graph.node_weight(edge.target())?;
                let node = self.nodes.get(&target_id)?;
                let view = self.hydrate(&node)?;
                Some(RelatedNode {
                    relation_type: edge.weight().relation_type.clone(),
                    weight: edge.weight().weight,
                    node: view,
                })
            })
            .collect()
    }

    /// Substring search over node names and metadata summaries.
    pub fn search_graph(&self, query: &str, limit: usize) -> Vec<NodeView> {
        let needle = query.to_lowercase();
        let mut ids: Vec<u64> = self
            .nodes
            .iter()
            .filter(|n| {
                n.name.to_lowercase().contains(&needle)
                    || serde_json::to_string(&n.metadata)
                        .map(|meta| meta.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            })
            .map(|n| n.id)
            .collect();
        ids.sort_unstable();
        ids.truncate(limit);

        ids.iter()
            .filter_map(|id| self.nodes.get(id).and_then(|n| self.hydrate(&n)))
            .collect()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count.load(Ordering::Relaxed)
    }

    fn insert_node_row(&self, node: KnowledgeNode) {
        let id = node.id;
        let mut graph = self.graph.write().expect("graph lock poisoned");
        let idx = graph.add_node(id);
        self.node_index.insert(id, idx);
        self.nodes.insert(id, node);
    }

    /// Wire an edge into the petgraph structure. Both endpoints must be
    /// indexed already.
    fn link(&self, edge: &KnowledgeEdge) -> GraphResult<()> {
        let source = self
            .node_index
            .get(&edge.source_id)
            .map(|i| *i)
            .ok_or(GraphError::MissingEndpoint {
                node_id: edge.source_id,
            })?;
        let target = self
            .node_index
            .get(&edge.target_id)
            .map(|i| *i)
            .ok_or(GraphError::MissingEndpoint {
                node_id: edge.target_id,
            })?;

        let mut graph = self.graph.write().expect("graph lock poisoned");
        graph.add_edge(
            source,
            target,
            EdgeAttr {
                relation_type: edge.relation_type.clone(),
                weight: edge.weight,
            },
        );
        self.edge_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn hydrate(&self, node: &KnowledgeNode) -> Option<NodeView> {
        match decompress(&node.content) {
            Ok(content) => Some(NodeView {
                id: node.id,
                name: node.name.clone(),
                node_type: node.node_type.clone(),
                content,
                metadata: node.metadata.clone(),
            }),
            Err(e) => {
                tracing::warn!(id = node.id, error = %e, "skipping undecodable node content");
                None
            }
        }
    }
}

impl std::fmt::Debug for KnowledgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraph")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_graph() -> KnowledgeGraph {
        KnowledgeGraph::new(Arc::new(Store::memory_only())).unwrap()
    }

    fn meta(pairs: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn add_node_and_get() {
        let graph = test_graph();
        let id = graph
            .add_node("Login Form", "task", "user-facing auth form", meta(&[]))
            .unwrap();

        let node = graph.get_node(id).unwrap();
        assert_eq!(node.name, "Login Form");
        assert_eq!(node.content, "user-facing auth form");
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn edge_requires_both_endpoints() {
        let graph = test_graph();
        let a = graph.add_node("a", "concept", "", meta(&[])).unwrap();

        let result = graph.add_edge(a, 9999, "relates_to", 1.0);
        assert!(matches!(
            result,
            Err(GraphError::MissingEndpoint { node_id: 9999 })
        ));
        assert_eq!(graph.edge_count(), 0);

        let result = graph.add_edge(9999, a, "relates_to", 1.0);
        assert!(result.is_err());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn related_nodes_are_outgoing_only() {
        let graph = test_graph();
        let task = graph.add_node("task", "task", "the task", meta(&[])).unwrap();
        let solution = graph
            .add_node("solution", "solution", "the fix", meta(&[]))
            .unwrap();
        graph.add_edge(task, solution, "solved_by", 1.0).unwrap();

        let related = graph.get_related_nodes(task);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].relation_type, "solved_by");
        assert_eq!(related[0].node.name, "solution");
        assert_eq!(related[0].node.content, "the fix");

        // Incoming edges are not reported.
        assert!(graph.get_related_nodes(solution).is_empty());
    }

    #[test]
    fn find_by_name_prefers_exact_match() {
        let graph = test_graph();
        graph
            .add_node("login form validation", "concept", "", meta(&[]))
            .unwrap();
        let exact = graph.add_node("Login Form", "task", "", meta(&[])).unwrap();

        let hit = graph.find_node_by_name("login form").unwrap();
        assert_eq!(hit.id, exact);

        let contains = graph.find_node_by_name("validation").unwrap();
        assert_eq!(contains.name, "login form validation");

        assert!(graph.find_node_by_name("missing").is_none());
    }

    #[test]
    fn search_covers_name_and_metadata() {
        let graph = test_graph();
        graph
            .add_node("deploy pipeline", "process", "", meta(&[]))
            .unwrap();
        graph
            .add_node("unrelated", "concept", "", meta(&[("domain", "deployment")]))
            .unwrap();
        graph.add_node("other", "concept", "", meta(&[])).unwrap();

        let hits = graph.search_graph("deploy", 10);
        assert_eq!(hits.len(), 2);

        let hits = graph.search_graph("deploy", 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn hydration_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let (task, solution);
        {
            let store = Arc::new(Store::with_persistence(dir.path()).unwrap());
            let graph = KnowledgeGraph::new(store).unwrap();
            task = graph.add_node("task", "task", "t", meta(&[])).unwrap();
            solution = graph.add_node("solution", "solution", "s", meta(&[])).unwrap();
            graph.add_edge(task, solution, "solved_by", 1.0).unwrap();
        }

        let store = Arc::new(Store::with_persistence(dir.path()).unwrap());
        let graph = KnowledgeGraph::new(store).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        let related = graph.get_related_nodes(task);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].node.id, solution);

        // Fresh ids must not collide with hydrated ones.
        let new = graph.add_node("new", "concept", "", meta(&[])).unwrap();
        assert!(new > solution);
    }
}
