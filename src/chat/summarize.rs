// src/chat/summarize.rs
// Session summarization: a thin second pass over stored turns. Triggered only
// by the /sessions/:id/summarize endpoint — never automatically.

use std::sync::Arc;

use crate::errors::{RecalldError, RecalldResult};
use crate::llm::config_repo::ConfigType;
use crate::llm::provider::{ChatRequest, Message};
use crate::llm::{self};
use crate::state::AppState;

const SUMMARY_PROMPT: &str = "Summarize the following conversation in 2-3 sentences, \
focusing on what the user wants and any decisions reached.";

pub async fn summarize_session(state: &Arc<AppState>, session_id: &str) -> RecalldResult<String> {
    let session = state
        .sessions
        .get(session_id)
        .await?
        .ok_or_else(|| RecalldError::NotFound(format!("session {session_id}")))?;

    let turns = state.sessions.all_turns(&session.id).await?;
    if turns.is_empty() {
        return Err(RecalldError::Validation("session has no turns to summarize".to_string()));
    }

    let transcript = turns
        .iter()
        .map(|t| format!("{}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n");

    let resolved = state
        .configs
        .resolve(ConfigType::Summarize, None, state.cipher.as_deref())
        .await?;
    let adapter = llm::build(&resolved).map_err(RecalldError::Internal)?;

    let response = adapter
        .chat(ChatRequest {
            messages: vec![Message::system(SUMMARY_PROMPT), Message::user(transcript)],
            model: resolved.model.clone(),
            max_tokens: resolved.max_tokens.unwrap_or(state.config.llm.max_tokens),
            temperature: resolved.temperature.unwrap_or(state.config.llm.temperature),
        })
        .await
        .map_err(|e| RecalldError::Upstream(e.to_string()))?;

    state.sessions.set_summary(&session.id, &response.content).await?;
    Ok(response.content)
}
