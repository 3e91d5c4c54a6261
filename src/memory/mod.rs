//! Scoped agent memory: universal (shared) and per-user records.
//!
//! Records are append-mostly: created by [`MemoryStore::add_memory`], mutated
//! only on read (access counters), and deleted only through the explicit
//! user-scoped [`MemoryStore::delete_memory`]. Content is compressed at rest;
//! each record carries a lexical embedding for similarity search.

pub mod index;
pub mod store;

pub use index::{LinearIndex, VectorIndex};
pub use store::MemoryStore;

use serde::{Deserialize, Serialize};

/// Whether a record is shared across all users or private to one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryScope {
    /// Shared knowledge, visible to every user.
    Universal,
    /// Private to the named user.
    User(String),
}

impl MemoryScope {
    /// The owning user id, if this is a user scope.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            MemoryScope::Universal => None,
            MemoryScope::User(id) => Some(id),
        }
    }
}

impl std::fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryScope::Universal => write!(f, "universal"),
            MemoryScope::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// Classification of a memory record.
///
/// The first five variants are used in universal scope, the rest in user
/// scope; the store does not enforce the pairing — callers own it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Fact,
    Pattern,
    Solution,
    ErrorFix,
    Optimization,
    Preference,
    Context,
    Conversation,
    TaskHistory,
    Feedback,
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MemoryType::Fact => "fact",
            MemoryType::Pattern => "pattern",
            MemoryType::Solution => "solution",
            MemoryType::ErrorFix => "error_fix",
            MemoryType::Optimization => "optimization",
            MemoryType::Preference => "preference",
            MemoryType::Context => "context",
            MemoryType::Conversation => "conversation",
            MemoryType::TaskHistory => "task_history",
            MemoryType::Feedback => "feedback",
        };
        write!(f, "{name}")
    }
}

/// A single persisted memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Store-assigned id.
    pub id: u64,
    /// Universal or per-user.
    pub scope: MemoryScope,
    /// Record classification.
    pub memory_type: MemoryType,
    /// Zlib-compressed content text.
    pub content: Vec<u8>,
    /// Opaque key-value context; only meaningful for user-scoped records.
    pub context: Option<serde_json::Map<String, serde_json::Value>>,
    /// Relevance weight, clamped to [0.0, 1.0].
    pub importance: f32,
    /// How many times this record was returned from a search.
    pub access_count: u64,
    /// Lexical embedding of the content (unit L2 norm, or all-zero).
    pub embedding: Vec<f32>,
    /// Creation timestamp (seconds since UNIX epoch).
    pub created_at: u64,
    /// Last read timestamp (seconds since UNIX epoch).
    pub last_accessed: u64,
}

/// A search or listing hit, hydrated for the caller.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryHit {
    pub id: u64,
    pub memory_type: MemoryType,
    /// Decompressed content text.
    pub content: String,
    pub importance: f32,
    /// Cosine similarity to the query; `None` for listings and the keyword
    /// fallback path.
    pub similarity: Option<f32>,
}

/// A per-user preference, unique on `(user_id, key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    pub user_id: String,
    pub key: String,
    /// Opaque value; the store never interprets it.
    pub value: serde_json::Value,
    /// How confident the agent is in this preference, in [0.0, 1.0].
    pub confidence: f32,
    /// Where this preference was learned from, if known.
    pub learned_from: Option<String>,
    /// Last upsert timestamp (seconds since UNIX epoch).
    pub updated_at: u64,
}

/// Current wall-clock time as seconds since the UNIX epoch.
pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
