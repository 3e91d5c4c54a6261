//! The reasoning seam.
//!
//! Everything that needs a "thinking" collaborator goes through the
//! [`Reasoner`] trait: the planner asks for scored candidate thoughts, the
//! brain asks for single decisions. Implementations are injected at
//! construction time so tests can swap in deterministic stand-ins.

pub mod heuristic;
pub mod ollama;

use crate::error::ReasonResult;

/// A single decision from the reasoner.
#[derive(Debug, Clone)]
pub struct Decision {
    /// The chosen action or thought.
    pub content: String,
    /// Why the reasoner chose it.
    pub rationale: String,
    /// Confidence in [0, 1].
    pub confidence: f32,
}

/// A scored candidate thought for beam expansion.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The candidate next-step thought.
    pub thought: String,
    /// Feasibility score in [0, 1].
    pub score: f32,
}

/// A reasoning collaborator.
///
/// `propose` never fails: unavailable services and unparseable responses
/// both degrade to zero candidates, which the planner treats as a dead end.
/// Only `decide` surfaces errors, for callers that need a definite answer.
pub trait Reasoner: Send + Sync {
    /// Produce a single decision for the prompt.
    fn decide(&self, prompt: &str) -> ReasonResult<Decision>;

    /// Produce up to `max` scored candidate thoughts for the prompt.
    fn propose(&self, prompt: &str, max: usize) -> Vec<Candidate>;
}

/// Clamp a reasoner-supplied score into [0, 1].
pub(crate) fn clamp_score(score: f32) -> f32 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_score_handles_out_of_range() {
        assert_eq!(clamp_score(1.7), 1.0);
        assert_eq!(clamp_score(-0.3), 0.0);
        assert_eq!(clamp_score(0.5), 0.5);
        assert_eq!(clamp_score(f32::NAN), 0.0);
    }
}
