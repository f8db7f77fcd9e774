// src/chat/orchestrator.rs
// Per-turn flow: resolve model config, assemble context, invoke the adapter,
// persist turns, fire-and-forget ProcessConversation.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures_util::StreamExt;
use tracing::warn;

use crate::errors::{RecalldError, RecalldResult};
use crate::llm::config_repo::ConfigType;
use crate::llm::provider::{ChatRequest as AdapterChatRequest, Message as LlmMessage, StreamChunk};
use crate::llm::{self};
use crate::memory::types::Session;
use crate::state::AppState;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChatTurnRequest {
    pub session_id: Option<String>,
    pub config_id: Option<String>,
    pub messages: Vec<LlmMessage>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatTurnResponse {
    pub session_id: String,
    pub content: String,
}

const DEFAULT_SESSION_TITLE: &str = "New conversation";

pub async fn resolve_session(state: &Arc<AppState>, request: &ChatTurnRequest) -> RecalldResult<Session> {
    if let Some(id) = &request.session_id {
        if let Some(session) = state.sessions.get(id).await? {
            return Ok(session);
        }
    }

    let query = first_user_message(&request.messages).unwrap_or("");
    let title = derive_title(query, state.config.llm.title_max_length);
    state.sessions.create(&title, request.config_id.as_deref()).await
}

fn derive_title(query: &str, max_length: usize) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return DEFAULT_SESSION_TITLE.to_string();
    }
    if trimmed.chars().count() <= max_length {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(max_length).collect();
    format!("{truncated}…")
}

fn first_user_message(messages: &[LlmMessage]) -> Option<&str> {
    messages.iter().find(|m| m.role == "user").map(|m| m.content.as_str())
}

/// Non-streaming path: await the reply, persist turns, fire-and-forget the
/// extraction pipeline, return the assistant content.
pub async fn handle_turn(state: Arc<AppState>, request: ChatTurnRequest) -> RecalldResult<ChatTurnResponse> {
    let session = resolve_session(&state, &request).await?;

    let resolved = state
        .configs
        .resolve(ConfigType::Chat, request.config_id.as_deref(), state.cipher.as_deref())
        .await?;
    let adapter = llm::build(&resolved).map_err(RecalldError::Internal)?;

    let query = first_user_message(&request.messages).unwrap_or("").to_string();
    let context = state.memory.build_context(&session.id, &query).await?;

    let mut full_messages = context;
    full_messages.extend(request.messages.iter().cloned());

    for message in request.messages.iter().filter(|m| m.role == "user") {
        state
            .memory
            .save_conversation_memory(&session.id, "user", &message.content)
            .await?;
    }

    let response = adapter
        .chat(AdapterChatRequest {
            messages: full_messages,
            model: resolved.model.clone(),
            max_tokens: resolved.max_tokens.unwrap_or(state.config.llm.max_tokens),
            temperature: resolved.temperature.unwrap_or(state.config.llm.temperature),
        })
        .await
        .map_err(|e| RecalldError::Upstream(e.to_string()))?;

    state
        .memory
        .save_conversation_memory(&session.id, "assistant", &response.content)
        .await?;
    state.sessions.touch(&session.id).await?;

    spawn_process_conversation(state.clone(), query, response.content.clone(), adapter, resolved.model.clone());

    Ok(ChatTurnResponse {
        session_id: session.id,
        content: response.content,
    })
}

/// Streaming path: forward deltas as they arrive; the assistant persistence
/// block fires exactly once, on the terminal `Done` chunk, even if multiple
/// arrive.
pub async fn handle_turn_stream(
    state: Arc<AppState>,
    request: ChatTurnRequest,
) -> RecalldResult<(String, BoxStream<'static, StreamChunk>)> {
    let session = resolve_session(&state, &request).await?;

    let resolved = state
        .configs
        .resolve(ConfigType::Chat, request.config_id.as_deref(), state.cipher.as_deref())
        .await?;
    let adapter = llm::build(&resolved).map_err(RecalldError::Internal)?;

    let query = first_user_message(&request.messages).unwrap_or("").to_string();
    let context = state.memory.build_context(&session.id, &query).await?;

    let mut full_messages = context;
    full_messages.extend(request.messages.iter().cloned());

    for message in request.messages.iter().filter(|m| m.role == "user") {
        state
            .memory
            .save_conversation_memory(&session.id, "user", &message.content)
            .await?;
    }

    let upstream = adapter
        .chat_stream(AdapterChatRequest {
            messages: full_messages,
            model: resolved.model.clone(),
            max_tokens: resolved.max_tokens.unwrap_or(state.config.llm.max_tokens),
            temperature: resolved.temperature.unwrap_or(state.config.llm.temperature),
        })
        .await
        .map_err(|e| RecalldError::Upstream(e.to_string()))?;

    let session_id = session.id.clone();
    let state_for_tail = state.clone();
    let adapter_for_tail = adapter.clone();
    let model_for_tail = resolved.model.clone();
    let mut persisted = false;

    let tail = async_stream::stream! {
        futures::pin_mut!(upstream);
        while let Some(chunk) = upstream.next().await {
            let is_done = matches!(chunk, StreamChunk::Done { .. });
            if let StreamChunk::Done { content, .. } = &chunk {
                if !persisted {
                    persisted = true;
                    if let Err(e) = state_for_tail
                        .memory
                        .save_conversation_memory(&session_id, "assistant", content)
                        .await
                    {
                        warn!(error = %e, "failed to persist streamed assistant reply");
                    }
                    if let Err(e) = state_for_tail.sessions.touch(&session_id).await {
                        warn!(error = %e, "failed to touch session after stream");
                    }
                    spawn_process_conversation(
                        state_for_tail.clone(),
                        query.clone(),
                        content.clone(),
                        adapter_for_tail.clone(),
                        model_for_tail.clone(),
                    );
                }
            }
            yield chunk;
            if is_done {
                return;
            }
        }
    };

    Ok((session.id, Box::pin(tail)))
}

/// Detached — deliberately does not inherit the request's cancellation. A
/// client disconnecting (including mid-stream) must not abort this; only the
/// process-wide shutdown drain in `main` waits on tasks like this one.
fn spawn_process_conversation(
    state: Arc<AppState>,
    user_msg: String,
    assistant_msg: String,
    adapter: Arc<dyn crate::llm::provider::LlmAdapter>,
    model: String,
) {
    tokio::spawn(async move {
        state.memory.process_conversation(&user_msg, &assistant_msg, &adapter, &model).await;
    });
}
