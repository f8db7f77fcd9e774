// src/api/http/memories.rs
// GET /api/v1/memories/search — semantic search over active knowledge.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::errors::RecalldResult;
use crate::memory::{KnowledgeSearchHit, SearchKnowledgeOptions};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub limit: Option<usize>,
}

pub async fn search_memories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> RecalldResult<Json<Vec<KnowledgeSearchHit>>> {
    let hits = state
        .memory
        .search_knowledge(SearchKnowledgeOptions {
            query: query.query,
            categories: vec![],
            active_only: true,
            min_score: 0.0,
            limit: query.limit.unwrap_or(state.config.memory.default_search_limit as usize),
        })
        .await?;
    Ok(Json(hits))
}
