//! The agent brain: orchestration over memory, skills, graph, and planner.
//!
//! `AgentBrain` answers "what do I know, what can I do, what should I do
//! next" by fanning out to the four services in parallel, and records task
//! outcomes back into memory, the graph, and the skill registry. All
//! services are constructor-injected; there is no global state.

use std::sync::Arc;

use crate::error::NoemaResult;
use crate::graph::{KnowledgeGraph, NodeView};
use crate::memory::{MemoryHit, MemoryScope, MemoryStore, MemoryType, Preference};
use crate::planner::Planner;
use crate::reason::Reasoner;
use crate::skills::{Skill, SkillCategory, SkillRegistry};

/// Ordered keyword categories for approach suggestion. First match wins,
/// so a task mentioning both code and GitHub gets the code approach.
const APPROACHES: &[(&[&str], &str)] = &[
    (
        &[
            "code", "coding", "program", "script", "debug", "function", "implement", "refactor",
            "compile", "bug",
        ],
        "use code execution",
    ),
    (
        &["github", "repo", "repository", "commit", "branch", "issue", "merge"],
        "use GitHub integration",
    ),
    (
        &["web", "browse", "browser", "website", "url", "online", "search"],
        "use browser",
    ),
    (
        &["remember", "recall", "memory", "memories", "learned"],
        "search memories",
    ),
];

const GENERIC_APPROACH: &str = "reason step by step with available tools";

/// Tasks longer than this (in chars or words) are worth planning for.
const COMPLEX_TASK_CHARS: usize = 20;
const COMPLEX_TASK_WORDS: usize = 4;

/// What the caller wants the brain to think about.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub user_id: String,
    pub task: String,
    /// Opaque snapshot of the caller's current situation, fed to the planner.
    pub state: String,
}

impl TaskContext {
    pub fn new(user_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            task: task.into(),
            state: String::new(),
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }
}

/// A one-hop relation out of a matched knowledge node.
#[derive(Debug, Clone)]
pub struct RelatedRef {
    pub relation_type: String,
    pub related_name: String,
}

/// A knowledge-graph match, expanded one hop.
#[derive(Debug, Clone)]
pub struct KnowledgeMatch {
    pub node: NodeView,
    pub related: Vec<RelatedRef>,
}

/// Everything the brain knows that is relevant to a task.
#[derive(Debug, Clone)]
pub struct BrainContext {
    /// Universal matches first, then the user's own.
    pub relevant_memories: Vec<MemoryHit>,
    pub relevant_skills: Vec<Skill>,
    pub relevant_knowledge: Vec<KnowledgeMatch>,
    pub preferences: Vec<Preference>,
    pub suggested_approach: String,
    /// Present only when the task passed the complexity gate.
    pub hierarchical_plan: Option<Vec<String>>,
}

/// An insight to be absorbed into memory and the knowledge graph.
#[derive(Debug, Clone)]
pub struct Insight {
    pub memory_type: MemoryType,
    pub content: String,
    pub importance: f32,
    /// Named entities; the first becomes the knowledge node's name.
    pub entities: Vec<String>,
    pub relations: Vec<InsightRelation>,
}

/// A relation from an insight's node to an existing node, by name.
#[derive(Debug, Clone)]
pub struct InsightRelation {
    pub target: String,
    pub relation_type: String,
}

/// The orchestrating facade over the four cognitive services.
pub struct AgentBrain {
    memory: Arc<MemoryStore>,
    skills: Arc<SkillRegistry>,
    graph: Arc<KnowledgeGraph>,
    planner: Planner,
}

impl AgentBrain {
    pub fn new(
        memory: Arc<MemoryStore>,
        skills: Arc<SkillRegistry>,
        graph: Arc<KnowledgeGraph>,
        reasoner: Arc<dyn Reasoner>,
    ) -> Self {
        Self {
            memory,
            skills,
            graph,
            planner: Planner::new(reasoner),
        }
    }

    /// Gather everything relevant to a task.
    ///
    /// The five sub-queries (universal memories, user memories, skills,
    /// preferences, graph matches) run as a parallel fork-join; nothing is
    /// exposed before the join completes. Retrieval is best-effort: a
    /// degraded service contributes an empty slice, never an error.
    pub fn think(&self, ctx: &TaskContext) -> BrainContext {
        let task = ctx.task.as_str();
        let user_scope = MemoryScope::User(ctx.user_id.clone());

        let ((universal, user_memories), (skills, (preferences, knowledge))) = rayon::join(
            || {
                rayon::join(
                    || self.memory.search_memory(&MemoryScope::Universal, task, 5),
                    || self.memory.search_memory(&user_scope, task, 5),
                )
            },
            || {
                rayon::join(
                    || self.relevant_skills(task),
                    || {
                        rayon::join(
                            || self.memory.get_all_preferences(&ctx.user_id),
                            || self.expand_graph_matches(task),
                        )
                    },
                )
            },
        );

        let mut relevant_memories = universal;
        relevant_memories.extend(user_memories);

        let suggested_approach = suggest_approach(task).to_string();

        let hierarchical_plan = if is_complex(task) {
            let background: String = relevant_memories
                .iter()
                .take(3)
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            Some(self.planner.plan(task, &ctx.state, &background))
        } else {
            None
        };

        BrainContext {
            relevant_memories,
            relevant_skills: skills,
            relevant_knowledge: knowledge,
            preferences,
            suggested_approach,
            hierarchical_plan,
        }
    }

    /// Absorb a batch of insights into universal memory and the graph.
    ///
    /// Memory writes are fire-and-forget; node and edge writes must
    /// succeed. Relations whose target node cannot be found by name are
    /// skipped silently.
    pub fn learn(&self, insights: &[Insight]) -> NoemaResult<()> {
        for insight in insights {
            let summary = truncate(&insight.content, 256);
            if let Err(e) = self.memory.add_memory(
                MemoryScope::Universal,
                insight.memory_type,
                &summary,
                insight.importance,
                None,
            ) {
                tracing::warn!(error = %e, "failed to store insight memory");
            }

            let name = insight
                .entities
                .first()
                .map(String::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| truncate(&insight.content, 40));
            let node_id = self.graph.add_node(
                &name,
                &insight.memory_type.to_string(),
                &insight.content,
                serde_json::Map::new(),
            )?;

            for relation in &insight.relations {
                match self.graph.find_node_by_name(&relation.target) {
                    Some(target) => {
                        self.graph
                            .add_edge(node_id, target.id, &relation.relation_type, 1.0)?;
                    }
                    None => {
                        tracing::debug!(target = relation.target.as_str(), "relation target not found");
                    }
                }
            }
        }
        Ok(())
    }

    /// Record the outcome of an executed task.
    ///
    /// Always stores a narrative into the user's memory and creates a task
    /// node. Successful tasks with more than two actions additionally become
    /// a reusable pattern: a skill, a universal pattern memory, a solution
    /// node, and a `solved_by` edge from the task node.
    pub fn learn_from_task(
        &self,
        user_id: &str,
        task: &str,
        actions: &[String],
        success: bool,
        notes: Option<&str>,
    ) -> NoemaResult<()> {
        let outcome = if success { "success" } else { "failure" };
        let mut narrative = format!(
            "Task: {task}\nActions: {}\nOutcome: {outcome}",
            actions.join(", ")
        );
        if let Some(notes) = notes {
            narrative.push_str(&format!("\nNotes: {notes}"));
        }

        let importance = if success { 0.7 } else { 0.5 };
        if let Err(e) = self.memory.add_memory(
            MemoryScope::User(user_id.to_string()),
            MemoryType::TaskHistory,
            &narrative,
            importance,
            None,
        ) {
            tracing::warn!(error = %e, "failed to store task history");
        }

        let task_node = self
            .graph
            .add_node(task, "task", &narrative, serde_json::Map::new())?;

        if success && actions.len() > 2 {
            let pattern_name: String = task
                .split_whitespace()
                .take(3)
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();

            let mut knowledge = serde_json::Map::new();
            knowledge.insert("task".into(), serde_json::Value::String(task.to_string()));
            knowledge.insert(
                "actions".into(),
                serde_json::Value::Array(
                    actions
                        .iter()
                        .map(|a| serde_json::Value::String(a.clone()))
                        .collect(),
                ),
            );
            self.skills.learn_skill(
                &pattern_name,
                SkillCategory::Automation,
                &format!("Learned pattern for: {task}"),
                knowledge,
            )?;

            if let Err(e) = self.memory.add_memory(
                MemoryScope::Universal,
                MemoryType::Pattern,
                &format!("Pattern for '{task}': {}", actions.join(" -> ")),
                0.7,
                None,
            ) {
                tracing::warn!(error = %e, "failed to store pattern memory");
            }

            let solution_node = self.graph.add_node(
                &format!("solution: {pattern_name}"),
                "solution",
                &actions.join(" -> "),
                serde_json::Map::new(),
            )?;
            self.graph
                .add_edge(task_node, solution_node, "solved_by", 1.0)?;
        }

        Ok(())
    }

    /// Render a bounded context block for injection into a prompt.
    pub fn get_context_for_task(&self, ctx: &TaskContext, include_plan: bool) -> String {
        let thought = self.think(ctx);
        let mut out = String::new();

        if !thought.relevant_memories.is_empty() {
            out.push_str("Relevant memories:\n");
            for hit in thought.relevant_memories.iter().take(3) {
                out.push_str(&format!("- [{}] {}\n", hit.memory_type, hit.content));
            }
        }

        if !thought.relevant_skills.is_empty() {
            out.push_str("Relevant skills:\n");
            for skill in thought.relevant_skills.iter().take(3) {
                out.push_str(&format!(
                    "- {} ({}, {:.0}% success over {} uses)\n",
                    skill.name,
                    skill.category,
                    skill.success_rate * 100.0,
                    skill.usage_count
                ));
            }
        }

        if !thought.preferences.is_empty() {
            let prefs: serde_json::Map<String, serde_json::Value> = thought
                .preferences
                .iter()
                .map(|p| (p.key.clone(), p.value.clone()))
                .collect();
            out.push_str(&format!(
                "User preferences: {}\n",
                serde_json::Value::Object(prefs)
            ));
        }

        out.push_str(&format!("Suggested approach: {}\n", thought.suggested_approach));

        if include_plan {
            if let Some(plan) = &thought.hierarchical_plan {
                if !plan.is_empty() {
                    out.push_str(&format!("Plan: {}\n", plan.join(" -> ")));
                }
            }
        }

        out
    }
}

impl std::fmt::Debug for AgentBrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentBrain")
            .field("memories", &self.memory.len())
            .field("skills", &self.skills.len())
            .field("graph", &self.graph)
            .finish()
    }
}

impl AgentBrain {
    /// Skill lookup per significant task word, deduplicated by name.
    ///
    /// The registry's substring search expects short needles; the full task
    /// string would almost never be contained in a skill name.
    fn relevant_skills(&self, task: &str) -> Vec<Skill> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for word in significant_words(task) {
            for skill in self.skills.search_skills(&word) {
                if seen.insert(skill.name.clone()) {
                    out.push(skill);
                }
            }
        }
        out
    }

    /// Graph lookup per significant task word, each match expanded one hop.
    fn expand_graph_matches(&self, task: &str) -> Vec<KnowledgeMatch> {
        let mut seen = std::collections::HashSet::new();
        let mut nodes = Vec::new();
        for word in significant_words(task) {
            for node in self.graph.search_graph(&word, 5) {
                if seen.insert(node.id) {
                    nodes.push(node);
                }
            }
        }
        nodes.truncate(5);

        nodes
            .into_iter()
            .map(|node| {
                let related = self
                    .graph
                    .get_related_nodes(node.id)
                    .into_iter()
                    .map(|r| RelatedRef {
                        relation_type: r.relation_type,
                        related_name: r.node.name,
                    })
                    .collect();
                KnowledgeMatch { node, related }
            })
            .collect()
    }
}

/// Lowercased task words long enough to be worth searching for.
fn significant_words(task: &str) -> Vec<String> {
    task.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| w.len() > 3)
        .collect()
}

/// Whether a task is worth a planner round-trip.
fn is_complex(task: &str) -> bool {
    task.len() > COMPLEX_TASK_CHARS || task.split_whitespace().count() > COMPLEX_TASK_WORDS
}

/// First matching keyword category wins; the order is part of the contract.
fn suggest_approach(task: &str) -> &'static str {
    let words: Vec<String> = task
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .collect();

    for (keywords, approach) in APPROACHES {
        if words.iter().any(|w| keywords.contains(&w.as_str())) {
            return approach;
        }
    }
    GENERIC_APPROACH
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
