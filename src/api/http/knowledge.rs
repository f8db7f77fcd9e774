// src/api/http/knowledge.rs
// Knowledge CRUD — manual entries go through the same AddKnowledge path as
// extracted facts, tagged with Source::Manual.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::errors::{RecalldError, RecalldResult};
use crate::memory::manager::AddKnowledgeOptions;
use crate::memory::types::{Category, Knowledge, Source, Tier};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListKnowledgeQuery {
    pub limit: Option<i64>,
    pub active_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateKnowledgeRequest {
    pub content: String,
    pub category: Option<String>,
    pub importance: Option<f32>,
    pub tier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateKnowledgeRequest {
    pub content: Option<String>,
    pub category: Option<String>,
    pub importance: Option<f32>,
}

pub async fn list_knowledge(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListKnowledgeQuery>,
) -> RecalldResult<Json<Vec<Knowledge>>> {
    let limit = query.limit.unwrap_or(100);
    let items = if query.active_only.unwrap_or(true) {
        state.knowledge.get_all_active(limit).await?
    } else {
        state.knowledge.get_all(limit).await?
    };
    Ok(Json(items))
}

pub async fn get_knowledge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> RecalldResult<Json<Knowledge>> {
    let item = state
        .knowledge
        .get_by_id(&id)
        .await?
        .ok_or_else(|| RecalldError::NotFound(format!("knowledge {id}")))?;
    Ok(Json(item))
}

pub async fn create_knowledge(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateKnowledgeRequest>,
) -> RecalldResult<Json<Knowledge>> {
    let tier = request
        .tier
        .as_deref()
        .map(|t| t.parse::<Tier>().map_err(RecalldError::Internal))
        .transpose()?;

    let created = state
        .memory
        .add_knowledge(AddKnowledgeOptions {
            content: request.content,
            category: request.category.as_deref().map(Category::normalize).unwrap_or(Category::Fact),
            source: Source::Manual,
            importance: request.importance,
            tier,
        })
        .await?;
    Ok(Json(created))
}

pub async fn update_knowledge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateKnowledgeRequest>,
) -> RecalldResult<Json<Knowledge>> {
    let mut knowledge = state
        .knowledge
        .get_by_id(&id)
        .await?
        .ok_or_else(|| RecalldError::NotFound(format!("knowledge {id}")))?;

    if let Some(content) = request.content {
        if content.trim().is_empty() {
            return Err(RecalldError::Validation("knowledge content must not be empty".to_string()));
        }
        knowledge.content = content;
    }
    if let Some(category) = request.category {
        knowledge.category = Category::normalize(&category);
    }
    if let Some(importance) = request.importance {
        knowledge.importance = importance;
    }

    state.knowledge.update(&knowledge).await?;
    Ok(Json(knowledge))
}

pub async fn delete_knowledge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> RecalldResult<impl IntoResponse> {
    state.memory.delete_knowledge(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
