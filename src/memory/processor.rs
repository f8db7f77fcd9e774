// src/memory/processor.rs
// Fact extraction and conflict judgement: prompt the model, parse its reply
// defensively. Malformed model output never errors the pipeline — it degrades
// to "no facts" / "create", matching the chat_analyzer extraction strategy this
// is grounded on.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::provider::{ChatRequest, LlmAdapter, Message};
use crate::memory::types::{Category, ConflictAction, Fact, Knowledge};

const EXTRACTION_MODEL_MAX_TOKENS: u32 = 512;
const EXTRACTION_TEMPERATURE: f32 = 0.2;

pub struct MemoryProcessor {
    default_importance: f32,
}

impl MemoryProcessor {
    pub fn new(default_importance: f32) -> Self {
        Self { default_importance }
    }

    pub async fn extract_facts(
        &self,
        user_msg: &str,
        assistant_msg: &str,
        llm: &Arc<dyn LlmAdapter>,
        model: &str,
    ) -> Vec<Fact> {
        let prompt = extraction_prompt(user_msg, assistant_msg);

        let response = match llm
            .chat(ChatRequest {
                messages: vec![Message::system(EXTRACTION_SYSTEM_PROMPT), Message::user(prompt)],
                model: model.to_string(),
                max_tokens: EXTRACTION_MODEL_MAX_TOKENS,
                temperature: EXTRACTION_TEMPERATURE,
            })
            .await
        {
            Ok(r) => r.content,
            Err(e) => {
                warn!(error = %e, "extraction call failed, returning no facts");
                return Vec::new();
            }
        };

        self.parse_facts(&response)
    }

    fn parse_facts(&self, response: &str) -> Vec<Fact> {
        let json_str = match extract_json_from_response(response) {
            Some(s) => s,
            None => {
                debug!("could not locate JSON in extraction response");
                return Vec::new();
            }
        };

        #[derive(Deserialize)]
        struct RawFact {
            content: String,
            #[serde(default)]
            category: Option<String>,
            #[serde(default)]
            importance: Option<f32>,
        }

        let raw: Vec<RawFact> = match serde_json::from_str(&json_str) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "failed to parse extraction JSON, returning no facts");
                return Vec::new();
            }
        };

        raw.into_iter()
            .filter(|f| !f.content.trim().is_empty())
            .map(|f| Fact {
                content: f.content,
                category: f
                    .category
                    .as_deref()
                    .map(Category::normalize)
                    .unwrap_or(Category::Fact),
                importance: f
                    .importance
                    .map(|i| {
                        if (0.0..=1.0).contains(&i) && i > 0.0 {
                            i
                        } else {
                            self.default_importance
                        }
                    })
                    .unwrap_or(self.default_importance),
            })
            .collect()
    }

    /// `candidates` must already be filtered to similarity >= the configured
    /// conflict-detection threshold and still-active.
    pub async fn detect_conflict(
        &self,
        new_fact: &Fact,
        candidates: &[Knowledge],
        llm: &Arc<dyn LlmAdapter>,
        model: &str,
    ) -> ConflictAction {
        if candidates.is_empty() {
            return ConflictAction::Create;
        }

        let prompt = conflict_prompt(new_fact, candidates);

        let response = match llm
            .chat(ChatRequest {
                messages: vec![Message::system(CONFLICT_SYSTEM_PROMPT), Message::user(prompt)],
                model: model.to_string(),
                max_tokens: EXTRACTION_MODEL_MAX_TOKENS,
                temperature: EXTRACTION_TEMPERATURE,
            })
            .await
        {
            Ok(r) => r.content,
            Err(e) => {
                warn!(error = %e, "conflict detection call failed, defaulting to create");
                return ConflictAction::Create;
            }
        };

        self.parse_conflict(&response, candidates)
    }

    fn parse_conflict(&self, response: &str, candidates: &[Knowledge]) -> ConflictAction {
        let json_str = match extract_json_from_response(response) {
            Some(s) => s,
            None => return ConflictAction::Create,
        };

        #[derive(Deserialize)]
        struct RawDecision {
            is_duplicate: bool,
            is_conflict: bool,
            #[serde(default)]
            conflict_index: Option<usize>,
        }

        let decision: RawDecision = match serde_json::from_str(&json_str) {
            Ok(v) => v,
            Err(_) => return ConflictAction::Create,
        };

        if decision.is_duplicate {
            return ConflictAction::Skip;
        }

        if decision.is_conflict {
            if let Some(index) = decision.conflict_index {
                if let Some(candidate) = candidates.get(index) {
                    return ConflictAction::Update {
                        conflict_id: candidate.id.clone(),
                        old_content: candidate.content.clone(),
                    };
                }
            }
        }

        ConflictAction::Create
    }
}

const EXTRACTION_SYSTEM_PROMPT: &str = "You extract durable facts about the user from a \
conversation exchange. Respond with a JSON array only, no prose.";

const CONFLICT_SYSTEM_PROMPT: &str = "You judge whether a new fact duplicates or \
conflicts with existing knowledge. Respond with a single JSON object only, no prose.";

fn extraction_prompt(user_msg: &str, assistant_msg: &str) -> String {
    format!(
        r#"Conversation exchange:
User: {user_msg}
Assistant: {assistant_msg}

Extract any durable facts about the user (identity, preferences, habits, background).
Return a JSON array of objects with this exact shape:
[{{"content": "declarative sentence", "category": "personal_info|preference|fact|event", "importance": 0.0-1.0}}]

If there is nothing durable to record, return an empty array: []"#
    )
}

fn conflict_prompt(new_fact: &Fact, candidates: &[Knowledge]) -> String {
    let candidate_list = candidates
        .iter()
        .enumerate()
        .map(|(i, k)| format!("{i}: {}", k.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"New fact: "{}"

Existing candidates:
{candidate_list}

Decide whether the new fact is a duplicate of one of the candidates, conflicts with one
of them (supersedes it), or is genuinely new. Return a single JSON object with this
exact shape:
{{"is_duplicate": bool, "is_conflict": bool, "conflict_index": <candidate index or null>}}"#,
        new_fact.content
    )
}

/// Layered extraction, grounded on chat_analyzer's `extract_json_from_response`:
/// already-valid JSON, then a fenced ```json block, then a brace/bracket-matched
/// substring. Never errors — returns `None` on total failure.
fn extract_json_from_response(response: &str) -> Option<String> {
    let trimmed = response.trim();
    if serde_json::from_str::<Value>(trimmed).is_ok() {
        return Some(trimmed.to_string());
    }

    if let Some(fenced) = extract_fenced_block(response) {
        if serde_json::from_str::<Value>(&fenced).is_ok() {
            return Some(fenced);
        }
    }

    if let Some(obj) = extract_balanced(response, '{', '}') {
        if serde_json::from_str::<Value>(&obj).is_ok() {
            return Some(obj);
        }
    }

    if let Some(arr) = extract_balanced(response, '[', ']') {
        if serde_json::from_str::<Value>(&arr).is_ok() {
            return Some(arr);
        }
    }

    None
}

fn extract_fenced_block(response: &str) -> Option<String> {
    let start = response.find("```")?;
    let after_fence = &response[start + 3..];
    let after_fence = after_fence.strip_prefix("json").unwrap_or(after_fence);
    let end = after_fence.find("```")?;
    Some(after_fence[..end].trim().to_string())
}

fn extract_balanced(response: &str, open: char, close: char) -> Option<String> {
    let start = response.find(open)?;
    let mut depth = 0i32;
    for (offset, ch) in response[start..].char_indices() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                return Some(response[start..start + offset + ch.len_utf8()].to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::memory::types::{Source, Tier};

    fn processor() -> MemoryProcessor {
        MemoryProcessor::new(0.5)
    }

    #[test]
    fn parses_fenced_json_array() {
        let raw = "Sure thing!\n```json\n[{\"content\": \"name is Zhang\", \"category\": \"personal_info\", \"importance\": 0.9}]\n```\nDone.";
        let facts = processor().parse_facts(raw);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "name is Zhang");
        assert_eq!(facts[0].category, Category::PersonalInfo);
    }

    #[test]
    fn unparseable_response_yields_no_facts() {
        let facts = processor().parse_facts("not json at all");
        assert!(facts.is_empty());
    }

    #[test]
    fn unknown_category_collapses_to_fact() {
        let raw = r#"[{"content": "likes tea", "category": "bogus", "importance": 0.6}]"#;
        let facts = processor().parse_facts(raw);
        assert_eq!(facts[0].category, Category::Fact);
    }

    #[test]
    fn out_of_range_importance_uses_default() {
        let raw = r#"[{"content": "x", "category": "fact", "importance": 5.0}]"#;
        let facts = processor().parse_facts(raw);
        assert!((facts[0].importance - 0.5).abs() < 1e-6);
    }

    fn knowledge(content: &str) -> Knowledge {
        let now = Utc::now();
        Knowledge {
            id: "k1".to_string(),
            content: content.to_string(),
            category: Category::Fact,
            source: Source::Manual,
            superseded_by: None,
            tier: Tier::Mid,
            hit_count: 0,
            last_hit_at: None,
            promoted_at: None,
            importance: 0.5,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_candidates_create_without_calling_model() {
        let decision = processor().parse_conflict("irrelevant", &[]);
        assert!(matches!(decision, ConflictAction::Create));
    }

    #[test]
    fn duplicate_flag_wins_regardless_of_conflict_flag() {
        let candidates = vec![knowledge("likes coffee")];
        let raw = r#"{"is_duplicate": true, "is_conflict": true, "conflict_index": 0}"#;
        let decision = processor().parse_conflict(raw, &candidates);
        assert!(matches!(decision, ConflictAction::Skip));
    }

    #[test]
    fn conflict_with_valid_index_updates() {
        let candidates = vec![knowledge("lives in Beijing")];
        let raw = r#"{"is_duplicate": false, "is_conflict": true, "conflict_index": 0}"#;
        let decision = processor().parse_conflict(raw, &candidates);
        match decision {
            ConflictAction::Update { conflict_id, .. } => assert_eq!(conflict_id, "k1"),
            _ => panic!("expected Update"),
        }
    }

    #[test]
    fn malformed_conflict_response_defaults_to_create() {
        let candidates = vec![knowledge("x")];
        let decision = processor().parse_conflict("garbage", &candidates);
        assert!(matches!(decision, ConflictAction::Create));
    }
}
