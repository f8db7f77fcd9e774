// src/config/memory.rs
// Memory pipeline thresholds and embedding provider configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Minimum cosine score for a candidate to be forwarded to the model-judged
    /// conflict check.
    pub conflict_detection_threshold: f32,
    /// Minimum score for the pre-filter recall that feeds DetectConflict.
    pub similar_knowledge_threshold: f32,
    /// Minimum score for inclusion in assembled context.
    pub context_relevance_threshold: f32,
    /// Minimum extracted importance to store at all (below discards the fact).
    pub mid_term_threshold: f32,
    /// Extracted importance at/above this is stored as `long` immediately.
    pub long_term_threshold: f32,
    /// Hit count at which a mid-tier entry promotes to long.
    pub mid_term_promote_hits: i64,
    /// Inactivity window (days) after which an un-promoted mid-tier entry expires.
    pub mid_term_expire_days: i64,
    /// How many recent turns the context builder fetches.
    pub recent_memory_limit: i64,
    /// Search-k for knowledge recall in context assembly.
    pub context_knowledge_limit: i64,
    /// Hard cap on distinct knowledge items injected into a prompt.
    pub max_knowledge_in_context: usize,
    /// Default search-k when a caller doesn't specify one.
    pub default_search_limit: i64,
    /// Candidate recall limit feeding the conflict check.
    pub conflict_check_limit: i64,
    /// Importance assigned to a fact the extractor omitted or mis-scored.
    pub default_importance: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            conflict_detection_threshold: 0.85,
            similar_knowledge_threshold: 0.70,
            context_relevance_threshold: 0.50,
            mid_term_threshold: 0.30,
            long_term_threshold: 0.75,
            mid_term_promote_hits: 3,
            mid_term_expire_days: 30,
            recent_memory_limit: 10,
            context_knowledge_limit: 10,
            max_knowledge_in_context: 5,
            default_search_limit: 10,
            conflict_check_limit: 5,
            default_importance: 0.5,
        }
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let unit_fields: [(&str, f32); 4] = [
            (
                "conflict_detection_threshold",
                self.conflict_detection_threshold,
            ),
            (
                "similar_knowledge_threshold",
                self.similar_knowledge_threshold,
            ),
            (
                "context_relevance_threshold",
                self.context_relevance_threshold,
            ),
            ("long_term_threshold", self.long_term_threshold),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("memory.{name} must be in [0,1], got {value}");
            }
        }
        if self.mid_term_promote_hits <= 0 {
            anyhow::bail!("memory.mid_term_promote_hits must be positive");
        }
        Ok(())
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            base_url: None,
        }
    }
}
