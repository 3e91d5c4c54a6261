//! Ollama-backed reasoner.
//!
//! Talks to a local Ollama server over its REST API with synchronous
//! `ureq` calls. Responses are free-form model text; candidate extraction
//! tolerates prose around the JSON array and treats anything unusable as
//! zero candidates.

use super::{Candidate, Decision, Reasoner, clamp_score};
use crate::error::{ReasonError, ReasonResult};

/// Configuration for the Ollama reasoner.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 120,
        }
    }
}

/// Reasoner backed by a local Ollama server.
pub struct OllamaReasoner {
    config: OllamaConfig,
    available: bool,
}

impl OllamaReasoner {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            available: false,
        }
    }

    /// Probe the server with a lightweight `/api/tags` request.
    pub fn probe(&mut self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(5))
            .build();

        self.available = matches!(agent.get(&url).call(), Ok(resp) if resp.status() == 200);
        self.available
    }

    /// Whether the server answered the last probe.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Generate a completion from a prompt.
    fn generate(&self, prompt: &str, system: Option<&str>) -> ReasonResult<String> {
        if !self.available {
            return Err(ReasonError::Unavailable {
                url: self.config.base_url.clone(),
            });
        }

        let url = format!("{}/api/generate", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys.to_string());
        }

        let body_str = serde_json::to_string(&body).map_err(|e| ReasonError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let resp = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body_str)
            .map_err(|e: ureq::Error| ReasonError::RequestFailed {
                message: e.to_string(),
            })?;

        let resp_str = resp.into_string().map_err(|e| ReasonError::ParseError {
            message: e.to_string(),
        })?;

        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| ReasonError::ParseError {
                message: e.to_string(),
            })?;

        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ReasonError::ParseError {
                message: "missing 'response' field".into(),
            })
    }
}

impl Reasoner for OllamaReasoner {
    fn decide(&self, prompt: &str) -> ReasonResult<Decision> {
        let system = "You are a planning assistant. Respond with a JSON object \
            with fields: content (the chosen next action), rationale, \
            confidence (0-1). Only return the JSON object, no other text.";

        let response = self.generate(prompt, Some(system))?;
        let trimmed = response.trim();

        // Tolerate prose around the object.
        let json_str = match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(s), Some(e)) if e > s => &trimmed[s..=e],
            _ => {
                return Err(ReasonError::ParseError {
                    message: "no JSON object found in response".into(),
                });
            }
        };

        let val: serde_json::Value =
            serde_json::from_str(json_str).map_err(|e| ReasonError::ParseError {
                message: format!("JSON parse error: {e}"),
            })?;

        let content = val["content"].as_str().unwrap_or("").to_string();
        if content.is_empty() {
            return Err(ReasonError::ParseError {
                message: "missing 'content' field".into(),
            });
        }

        Ok(Decision {
            content,
            rationale: val["rationale"].as_str().unwrap_or("").to_string(),
            confidence: clamp_score(val["confidence"].as_f64().unwrap_or(0.5) as f32),
        })
    }

    fn propose(&self, prompt: &str, max: usize) -> Vec<Candidate> {
        let system = format!(
            "You are a planning assistant. Propose up to {max} candidate next-step \
             thoughts for the given task. Return a JSON array of objects with \
             fields: thought, score (0-1 feasibility). Only return the JSON \
             array, no other text."
        );

        let response = match self.generate(prompt, Some(&system)) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "reasoner call failed, zero candidates");
                return Vec::new();
            }
        };

        parse_candidates(&response, max)
    }
}

/// Extract `{thought, score}` candidates from free-form model output.
///
/// Finds the first JSON array in the text; anything unusable yields an
/// empty vec. Entries without a thought string are skipped, scores are
/// clamped to [0, 1].
fn parse_candidates(response: &str, max: usize) -> Vec<Candidate> {
    let trimmed = response.trim();
    let json_str = if trimmed.starts_with('[') {
        trimmed
    } else {
        match (trimmed.find('['), trimmed.rfind(']')) {
            (Some(s), Some(e)) if e > s => &trimmed[s..=e],
            _ => return Vec::new(),
        }
    };

    let parsed: Vec<serde_json::Value> = match serde_json::from_str(json_str) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    parsed
        .iter()
        .filter_map(|val| {
            let thought = val["thought"].as_str()?.trim();
            if thought.is_empty() {
                return None;
            }
            Some(Candidate {
                thought: thought.to_string(),
                score: clamp_score(val["score"].as_f64().unwrap_or(0.5) as f32),
            })
        })
        .take(max)
        .collect()
}

impl std::fmt::Debug for OllamaReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaReasoner")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("available", &self.available)
            .finish()
    }
}
