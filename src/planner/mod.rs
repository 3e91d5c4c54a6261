//! Bounded beam search over candidate thoughts.
//!
//! The planner expands a tree of thoughts level by level, asking the
//! reasoner for scored next-step candidates at each retained node. The
//! beam is global: all children produced at a level compete for the same
//! `branch_factor` slots regardless of parent, so a strong branch can
//! crowd out its siblings. That keeps the cost bound at one reasoner
//! round-trip per retained node per level.
//!
//! Thought nodes live in a flat arena for the duration of one `plan()`
//! call and are never persisted.

use std::sync::Arc;

use rayon::prelude::*;

use crate::reason::{Reasoner, clamp_score};

/// Planner search parameters.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Maximum tree depth below the root, and maximum plan length.
    pub max_depth: usize,
    /// Global beam width, and per-node candidate request size.
    pub branch_factor: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            branch_factor: 3,
        }
    }
}

/// One node in the ephemeral thought tree. Indices refer into the arena.
#[derive(Debug, Clone)]
struct ThoughtNode {
    thought: String,
    score: f32,
    children: Vec<usize>,
    depth: usize,
}

/// Beam-search planner over reasoner-proposed thoughts.
pub struct Planner {
    reasoner: Arc<dyn Reasoner>,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self::with_config(reasoner, PlannerConfig::default())
    }

    pub fn with_config(reasoner: Arc<dyn Reasoner>, config: PlannerConfig) -> Self {
        Self { reasoner, config }
    }

    /// Plan a sequence of next-step thoughts for a task.
    ///
    /// `state` is an opaque snapshot of the caller's current situation and
    /// `context` carries any retrieved background text. Returns the
    /// highest-scoring root-to-leaf path, root excluded. Empty when the
    /// reasoner produces no candidates at depth 1.
    pub fn plan(&self, task: &str, state: &str, context: &str) -> Vec<String> {
        let mut arena: Vec<ThoughtNode> = vec![ThoughtNode {
            thought: task.to_string(),
            score: 1.0,
            children: Vec::new(),
            depth: 0,
        }];

        let mut retained: Vec<usize> = vec![0];

        for depth in 1..=self.config.max_depth {
            // One reasoner round-trip per retained node, issued in parallel.
            let expansions: Vec<(usize, Vec<crate::reason::Candidate>)> = retained
                .par_iter()
                .map(|&idx| {
                    let prompt = self.expansion_prompt(task, state, context, &arena[idx].thought);
                    (idx, self.reasoner.propose(&prompt, self.config.branch_factor))
                })
                .collect();

            // Attach children, pooling them across all parents.
            let mut level: Vec<usize> = Vec::new();
            for (parent, candidates) in expansions {
                for candidate in candidates {
                    let child = arena.len();
                    arena.push(ThoughtNode {
                        thought: candidate.thought,
                        score: clamp_score(candidate.score),
                        children: Vec::new(),
                        depth,
                    });
                    arena[parent].children.push(child);
                    level.push(child);
                }
            }

            if level.is_empty() {
                tracing::debug!(depth, "no candidates produced, stopping expansion");
                break;
            }

            // Single global beam: the best branch_factor children of the
            // whole level survive, regardless of parent.
            level.sort_by(|&a, &b| {
                arena[b]
                    .score
                    .partial_cmp(&arena[a].score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            level.truncate(self.config.branch_factor);
            retained = level;
        }

        self.best_path(&arena)
    }

    fn expansion_prompt(&self, task: &str, state: &str, context: &str, thought: &str) -> String {
        let mut prompt = format!("Task: {task}\n");
        if !state.is_empty() {
            prompt.push_str(&format!("Current state: {state}\n"));
        }
        if !context.is_empty() {
            prompt.push_str(&format!("Context: {context}\n"));
        }
        if thought != task {
            prompt.push_str(&format!("Current step: {thought}\n"));
        }
        prompt.push_str("What should happen next?");
        prompt
    }

    /// Walk from the root, always following the highest-scoring child.
    /// Ties go to the first-encountered child.
    fn best_path(&self, arena: &[ThoughtNode]) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = 0usize;

        while let Some(&best) = arena[current].children.iter().max_by(|&&a, &&b| {
            arena[a]
                .score
                .partial_cmp(&arena[b].score)
                .unwrap_or(std::cmp::Ordering::Equal)
                // max_by keeps the later element on Equal, so invert ties
                // to keep the first-encountered child.
                .then(std::cmp::Ordering::Greater)
        }) {
            path.push(arena[best].thought.clone());
            current = best;
        }

        path
    }
}

impl std::fmt::Debug for Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner").field("config", &self.config).finish()
    }
}
