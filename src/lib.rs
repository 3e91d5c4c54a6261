//! # noema
//!
//! The cognitive core of an AI agent: persistent memory, a skill-proficiency
//! registry, an append-only knowledge graph, and a bounded beam-search
//! planner, orchestrated by a single [`brain::AgentBrain`] facade.
//!
//! ## Architecture
//!
//! - **Lexical embedding** (`embed`): deterministic text → 384-dim vector
//! - **Memory store** (`memory`): scoped records with similarity and keyword search
//! - **Skill registry** (`skills`): mergeable capability records with running stats
//! - **Knowledge graph** (`graph`): typed nodes and weighted directed edges
//! - **Planner** (`planner`): bounded beam search over reasoner-proposed thoughts
//! - **Tiered storage** (`store`): hot (memory) → durable (redb)
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use noema::brain::{AgentBrain, TaskContext};
//! use noema::graph::KnowledgeGraph;
//! use noema::memory::MemoryStore;
//! use noema::reason::heuristic::HeuristicReasoner;
//! use noema::skills::SkillRegistry;
//! use noema::store::Store;
//!
//! let store = Arc::new(Store::memory_only());
//! let brain = AgentBrain::new(
//!     Arc::new(MemoryStore::new(Arc::clone(&store)).unwrap()),
//!     Arc::new(SkillRegistry::new(Arc::clone(&store)).unwrap()),
//!     Arc::new(KnowledgeGraph::new(store).unwrap()),
//!     Arc::new(HeuristicReasoner::default()),
//! );
//! let ctx = brain.think(&TaskContext::new("alice", "fix the login form bug"));
//! println!("{}", ctx.suggested_approach);
//! ```

pub mod brain;
pub mod compress;
pub mod embed;
pub mod error;
pub mod graph;
pub mod memory;
pub mod planner;
pub mod reason;
pub mod skills;
pub mod store;
