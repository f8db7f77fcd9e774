// src/api/http/sessions.rs
// Session listing, detail, deletion, turn deletion, and summarization.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::chat;
use crate::errors::{RecalldError, RecalldResult};
use crate::memory::types::{Session, Turn};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: Session,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub session_id: String,
    pub summary: String,
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListSessionsQuery>,
) -> RecalldResult<Json<Vec<Session>>> {
    let sessions = state.sessions.list(query.limit.unwrap_or(50)).await?;
    Ok(Json(sessions))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> RecalldResult<Json<SessionDetail>> {
    let session = state
        .sessions
        .get(&id)
        .await?
        .ok_or_else(|| RecalldError::NotFound(format!("session {id}")))?;
    let turns = state.sessions.all_turns(&session.id).await?;
    Ok(Json(SessionDetail { session, turns }))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> RecalldResult<impl IntoResponse> {
    state.sessions.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Path((_session_id, message_id)): Path<(String, String)>,
) -> RecalldResult<impl IntoResponse> {
    state.sessions.delete_turn(&message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn summarize_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> RecalldResult<Json<SummarizeResponse>> {
    let summary = chat::summarize_session(&state, &id).await?;
    Ok(Json(SummarizeResponse { session_id: id, summary }))
}
