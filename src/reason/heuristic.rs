//! Deterministic offline reasoner.
//!
//! Used when no LLM is reachable, and in tests. Candidates are derived from
//! a fixed sequence of task phases with descending scores, so plans are
//! reproducible run to run.

use super::{Candidate, Decision, Reasoner, clamp_score};
use crate::error::ReasonResult;

const PHASES: &[&str] = &[
    "break the task into concrete steps",
    "gather the information each step needs",
    "execute the steps in order",
    "verify the result against the original goal",
    "record what worked for next time",
];

/// A reasoner that needs no external service.
#[derive(Debug, Default)]
pub struct HeuristicReasoner;

impl Reasoner for HeuristicReasoner {
    fn decide(&self, prompt: &str) -> ReasonResult<Decision> {
        let first = self.propose(prompt, 1);
        let content = first
            .first()
            .map(|c| c.thought.clone())
            .unwrap_or_else(|| PHASES[0].to_string());
        Ok(Decision {
            content,
            rationale: "first phase of the standard task breakdown".into(),
            confidence: 0.5,
        })
    }

    fn propose(&self, prompt: &str, max: usize) -> Vec<Candidate> {
        // Rotate the starting phase by prompt length so successive beam
        // levels (whose prompts grow) advance through the sequence.
        let offset = prompt.split_whitespace().count() % PHASES.len();
        PHASES
            .iter()
            .cycle()
            .skip(offset)
            .take(max.min(PHASES.len()))
            .enumerate()
            .map(|(i, phase)| Candidate {
                thought: (*phase).to_string(),
                score: clamp_score(0.9 - 0.1 * i as f32),
            })
            .collect()
    }
}
