//! Skill records: named capabilities with merged knowledge and usage stats.

pub mod registry;

pub use registry::SkillRegistry;

use serde::{Deserialize, Serialize};

use crate::error::SkillError;

/// Broad capability category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Coding,
    Research,
    Communication,
    Analysis,
    Automation,
    Integration,
}

impl std::fmt::Display for SkillCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SkillCategory::Coding => "coding",
            SkillCategory::Research => "research",
            SkillCategory::Communication => "communication",
            SkillCategory::Analysis => "analysis",
            SkillCategory::Automation => "automation",
            SkillCategory::Integration => "integration",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for SkillCategory {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coding" => Ok(SkillCategory::Coding),
            "research" => Ok(SkillCategory::Research),
            "communication" => Ok(SkillCategory::Communication),
            "analysis" => Ok(SkillCategory::Analysis),
            "automation" => Ok(SkillCategory::Automation),
            "integration" => Ok(SkillCategory::Integration),
            other => Err(SkillError::UnknownCategory {
                category: other.into(),
            }),
        }
    }
}

/// A learned capability. `name` is the sole identity key — re-learning the
/// same name merges into the existing row instead of creating a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    /// Store-assigned id (stable across merges).
    pub id: u64,
    /// Unique name.
    pub name: String,
    pub category: SkillCategory,
    /// Latest description; replaced wholesale on re-learn.
    pub description: String,
    /// Merged knowledge blob. Shallow merge: new keys overwrite old, no
    /// deep merging of nested values.
    pub knowledge: serde_json::Map<String, serde_json::Value>,
    /// Completed `record_usage` calls.
    pub usage_count: u64,
    /// Running success rate over all usages, in [0.0, 1.0].
    pub success_rate: f32,
    /// Persisted maturity indicator; initialized to 1 and never recomputed
    /// automatically.
    pub proficiency_level: u32,
    /// Last usage timestamp (seconds since UNIX epoch).
    pub last_used: u64,
}
