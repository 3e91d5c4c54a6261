//! Append-only knowledge graph: typed entities and weighted, typed relations.
//!
//! Nodes and edges are created and never updated or deleted in this version.
//! Node content is compressed at rest and hydrated on read.

pub mod index;

pub use index::KnowledgeGraph;

use serde::{Deserialize, Serialize};

/// A typed entity, stored compressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    /// Store-assigned id.
    pub id: u64,
    pub name: String,
    /// Free-form type tag ("task", "solution", "concept", ...).
    pub node_type: String,
    /// Zlib-compressed content text.
    pub content: Vec<u8>,
    /// Opaque structured metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A directed, typed, weighted relation between two existing nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    pub id: u64,
    pub source_id: u64,
    pub target_id: u64,
    pub relation_type: String,
    pub weight: f32,
}

/// A node hydrated for callers: content decompressed.
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub id: u64,
    pub name: String,
    pub node_type: String,
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// One outgoing relation from a node, with the target hydrated.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedNode {
    pub relation_type: String,
    pub weight: f32,
    pub node: NodeView,
}
