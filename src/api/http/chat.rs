// src/api/http/chat.rs
// POST /api/v1/chat — non-streaming and SSE modes share one orchestrator call.

use std::sync::Arc;

use axum::{
    Json,
    http::HeaderValue,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::{stream, StreamExt};
use serde_json::json;
use tracing::warn;

use crate::chat::{self, ChatTurnRequest, ChatTurnResponse};
use crate::errors::RecalldResult;
use crate::llm::provider::StreamChunk;
use crate::state::AppState;

const SESSION_ID_HEADER: &str = "x-session-id";

pub async fn chat_turn(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    Json(request): Json<ChatTurnRequest>,
) -> RecalldResult<Response> {
    if request.stream {
        let (session_id, chunks) = chat::handle_turn_stream(state, request).await?;
        // Clients that can't read response headers mid-stream still need the
        // resolved session_id, so it also opens the event payload stream.
        let session_event = Event::default()
            .event("message")
            .data(json!({ "session_id": session_id, "done": false }).to_string());
        let events = stream::once(async move { Ok::<Event, std::convert::Infallible>(session_event) })
            .chain(chunks.map(|chunk| Ok::<Event, std::convert::Infallible>(chunk_to_event(chunk))));
        let mut response = Sse::new(events).keep_alive(KeepAlive::default()).into_response();
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
        Ok(response)
    } else {
        let ChatTurnResponse { session_id, content } = chat::handle_turn(state, request).await?;
        let mut response = Json(json!({ "session_id": session_id, "content": content })).into_response();
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
        Ok(response)
    }
}

fn chunk_to_event(chunk: StreamChunk) -> Event {
    match chunk {
        StreamChunk::Delta(delta) => Event::default().event("message").data(
            json!({ "delta": delta, "done": false }).to_string(),
        ),
        StreamChunk::Done { content, usage } => Event::default().event("message").data(
            json!({ "delta": "", "content": content, "usage": usage, "done": true }).to_string(),
        ),
        StreamChunk::Error(message) => {
            warn!(%message, "upstream stream error");
            Event::default().event("message").data(json!({ "error": message, "done": true }).to_string())
        }
    }
}
