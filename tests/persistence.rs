//! Persistence and recovery tests for the noema cognitive core.
//!
//! These tests verify that memories, preferences, skills, and graph state
//! survive a close + reopen cycle, and that id allocation resumes past the
//! hydrated rows.

use std::path::Path;
use std::sync::Arc;

use noema::graph::KnowledgeGraph;
use noema::memory::{MemoryScope, MemoryStore, MemoryType};
use noema::skills::{SkillCategory, SkillRegistry};
use noema::store::Store;

fn persistent_store(dir: &Path) -> Arc<Store> {
    Arc::new(Store::with_persistence(dir).unwrap())
}

#[test]
fn cold_start_on_fresh_directory() {
    // First-ever open: hydration scans run against an empty database and
    // every subsystem must come up empty rather than erroring.
    let dir = tempfile::TempDir::new().unwrap();
    let store = persistent_store(dir.path());

    let memory = MemoryStore::new(Arc::clone(&store)).unwrap();
    let skills = SkillRegistry::new(Arc::clone(&store)).unwrap();
    let graph = KnowledgeGraph::new(store).unwrap();

    assert!(memory.is_empty());
    assert!(skills.is_empty());
    assert_eq!(graph.node_count(), 0);
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn memories_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let id;

    {
        let memory = MemoryStore::new(persistent_store(dir.path())).unwrap();
        id = memory
            .add_memory(
                MemoryScope::Universal,
                MemoryType::Fact,
                "the staging cluster lives in eu-west",
                0.8,
                None,
            )
            .unwrap();
        memory
            .add_memory(
                MemoryScope::User("alice".into()),
                MemoryType::Context,
                "alice works on the staging cluster",
                0.5,
                None,
            )
            .unwrap();
    }

    {
        let memory = MemoryStore::new(persistent_store(dir.path())).unwrap();
        assert_eq!(memory.len(), 2);

        // Similarity search works over hydrated embeddings.
        let hits = memory.search_memory(&MemoryScope::Universal, "staging cluster", 5);
        assert!(hits.iter().any(|h| h.id == id));

        // Scope filtering still applies after reopen.
        let user_hits = memory.search_memory(&MemoryScope::User("alice".into()), "staging", 5);
        assert_eq!(user_hits.len(), 1);

        // New ids continue past the hydrated maximum.
        let new_id = memory
            .add_memory(MemoryScope::Universal, MemoryType::Fact, "new fact", 0.5, None)
            .unwrap();
        assert!(new_id > id);
    }
}

#[test]
fn preferences_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let memory = MemoryStore::new(persistent_store(dir.path())).unwrap();
        memory
            .set_preference("bob", "editor", serde_json::json!("helix"), 0.9, Some("observed".into()))
            .unwrap();
    }

    {
        let memory = MemoryStore::new(persistent_store(dir.path())).unwrap();
        assert_eq!(
            memory.get_preference("bob", "editor"),
            Some(serde_json::json!("helix"))
        );
        let all = memory.get_all_preferences("bob");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].learned_from.as_deref(), Some("observed"));
    }
}

#[test]
fn skills_survive_restart_with_stats() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let skills = SkillRegistry::new(persistent_store(dir.path())).unwrap();
        let mut knowledge = serde_json::Map::new();
        knowledge.insert("endpoint".into(), serde_json::json!("/v1/charge"));
        skills
            .learn_skill("charge api", SkillCategory::Integration, "stripe charge wrapper", knowledge)
            .unwrap();
        for success in [true, true, false] {
            skills.record_usage("charge api", success).unwrap();
        }
    }

    {
        let skills = SkillRegistry::new(persistent_store(dir.path())).unwrap();
        let skill = skills.get_skill("charge api").unwrap();
        assert_eq!(skill.usage_count, 3);
        assert!((skill.success_rate - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(skill.knowledge["endpoint"], serde_json::json!("/v1/charge"));

        // Merge into the hydrated row rather than duplicating it.
        let mut more = serde_json::Map::new();
        more.insert("retries".into(), serde_json::json!(3));
        skills
            .learn_skill("charge api", SkillCategory::Integration, "updated", more)
            .unwrap();
        assert_eq!(skills.len(), 1);
        let merged = skills.get_skill("charge api").unwrap();
        assert_eq!(merged.knowledge["endpoint"], serde_json::json!("/v1/charge"));
        assert_eq!(merged.knowledge["retries"], serde_json::json!(3));
        assert_eq!(merged.usage_count, 3); // stats untouched by merge
    }
}

#[test]
fn graph_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let (task, solution);

    {
        let graph = KnowledgeGraph::new(persistent_store(dir.path())).unwrap();
        task = graph
            .add_node("migrate database", "task", "move rows to the new schema", serde_json::Map::new())
            .unwrap();
        solution = graph
            .add_node("batched copy", "solution", "copy in 10k batches", serde_json::Map::new())
            .unwrap();
        graph.add_edge(task, solution, "solved_by", 1.0).unwrap();
    }

    {
        let graph = KnowledgeGraph::new(persistent_store(dir.path())).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);

        let node = graph.find_node_by_name("migrate database").unwrap();
        assert_eq!(node.id, task);
        assert_eq!(node.content, "move rows to the new schema");

        let related = graph.get_related_nodes(task);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].node.id, solution);
        assert_eq!(related[0].relation_type, "solved_by");
    }
}

#[test]
fn deleted_memories_stay_deleted() {
    let dir = tempfile::TempDir::new().unwrap();
    let scope = MemoryScope::User("carol".into());
    let id;

    {
        let memory = MemoryStore::new(persistent_store(dir.path())).unwrap();
        id = memory
            .add_memory(scope.clone(), MemoryType::Conversation, "temporary note", 0.3, None)
            .unwrap();
        assert!(memory.delete_memory(&scope, id));
    }

    {
        let memory = MemoryStore::new(persistent_store(dir.path())).unwrap();
        assert!(memory.is_empty());
        assert!(memory.search_memory(&scope, "temporary", 5).is_empty());
    }
}
