//! Skill registry: learn, merge, and track usage of named capabilities.
//!
//! The one correctness-critical hazard here is `record_usage`: the
//! read-modify-write of `(usage_count, success_rate)` must be serialized per
//! skill name. `DashMap::get_mut` holds the shard write lock for the entry
//! while the update runs, so after `n` completed calls `usage_count == n`
//! exactly — no lost updates.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::error::{SkillError, SkillResult, StoreError};
use crate::memory::now_secs;
use crate::store::Store;

use super::{Skill, SkillCategory};

fn skill_key(name: &str) -> String {
    format!("skill:{name}")
}

/// Registry of named, mergeable skills.
pub struct SkillRegistry {
    store: Arc<Store>,
    skills: DashMap<String, Skill>,
    next_id: AtomicU64,
}

impl SkillRegistry {
    /// Create a registry, hydrating existing skills from the backing store.
    pub fn new(store: Arc<Store>) -> SkillResult<Self> {
        let skills = DashMap::new();
        let mut max_id = 0u64;

        for (key, bytes) in store.scan_prefix("skill:")? {
            match bincode::deserialize::<Skill>(&bytes) {
                Ok(skill) => {
                    max_id = max_id.max(skill.id);
                    skills.insert(skill.name.clone(), skill);
                }
                Err(e) => {
                    tracing::warn!(key = key.as_str(), error = %e, "skipping unreadable skill row");
                }
            }
        }

        Ok(Self {
            store,
            skills,
            next_id: AtomicU64::new(max_id + 1),
        })
    }

    /// Learn a skill, or merge into an existing one of the same name.
    ///
    /// On merge: `knowledge` is shallow-merged (new keys win), the
    /// description is replaced, and usage stats are left untouched. Returns
    /// the skill id.
    pub fn learn_skill(
        &self,
        name: &str,
        category: SkillCategory,
        description: &str,
        knowledge: serde_json::Map<String, serde_json::Value>,
    ) -> SkillResult<u64> {
        // Entry API keeps create-vs-merge atomic for a given name.
        let mut entry = self
            .skills
            .entry(name.to_string())
            .or_insert_with(|| Skill {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                name: name.to_string(),
                category,
                description: String::new(),
                knowledge: serde_json::Map::new(),
                usage_count: 0,
                success_rate: 0.0,
                proficiency_level: 1,
                last_used: now_secs(),
            });

        for (key, value) in knowledge {
            entry.knowledge.insert(key, value);
        }
        entry.description = description.to_string();

        self.persist(&entry)?;
        Ok(entry.id)
    }

    /// Record one usage outcome, updating the running success rate.
    ///
    /// After outcomes `[T, T, T, F]` on a fresh skill the stats are exactly
    /// `usage_count == 4`, `success_rate == 0.75`.
    pub fn record_usage(&self, name: &str, success: bool) -> SkillResult<()> {
        let mut skill = self.skills.get_mut(name).ok_or_else(|| SkillError::NotFound {
            name: name.into(),
        })?;
        let n = skill.usage_count + 1;
        let outcome = if success { 1.0 } else { 0.0 };
        skill.success_rate = ((skill.success_rate * (n - 1) as f32) + outcome) / n as f32;
        skill.usage_count = n;
        skill.last_used = now_secs();
        // Persist while the entry lock is held so durable rows can't be
        // written out of order by racing updates.
        self.persist(&skill)
    }

    /// Look up a skill by its unique name.
    pub fn get_skill(&self, name: &str) -> Option<Skill> {
        self.skills.get(name).map(|s| s.clone())
    }

    /// All skills in a category, most used first.
    pub fn get_by_category(&self, category: SkillCategory) -> Vec<Skill> {
        let mut skills: Vec<Skill> = self
            .skills
            .iter()
            .filter(|entry| entry.category == category)
            .map(|entry| entry.value().clone())
            .collect();
        skills.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        skills
    }

    /// The `limit` most used skills across all categories.
    pub fn get_most_used(&self, limit: usize) -> Vec<Skill> {
        let mut skills: Vec<Skill> = self.skills.iter().map(|e| e.value().clone()).collect();
        skills.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        skills.truncate(limit);
        skills
    }

    /// Case-insensitive substring search over names and descriptions.
    pub fn search_skills(&self, query: &str) -> Vec<Skill> {
        let needle = query.to_lowercase();
        let mut skills: Vec<Skill> = self
            .skills
            .iter()
            .filter(|entry| {
                entry.name.to_lowercase().contains(&needle)
                    || entry.description.to_lowercase().contains(&needle)
            })
            .map(|entry| entry.value().clone())
            .collect();
        skills.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        skills
    }

    /// All skills, ordered by category then name.
    pub fn get_all(&self) -> Vec<Skill> {
        let mut skills: Vec<Skill> = self.skills.iter().map(|e| e.value().clone()).collect();
        skills.sort_by(|a, b| a.category.cmp(&b.category).then(a.name.cmp(&b.name)));
        skills
    }

    /// Number of registered skills.
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Whether no skills are registered.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    fn persist(&self, skill: &Skill) -> SkillResult<()> {
        let bytes = bincode::serialize(skill).map_err(|e| StoreError::Serialization {
            message: format!("failed to serialize skill: {e}"),
        })?;
        self.store.put(&skill_key(&skill.name), &bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.skills.len())
            .finish()
    }
}
