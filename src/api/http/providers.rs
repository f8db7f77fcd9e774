// src/api/http/providers.rs
// Provider/model configuration CRUD. Plaintext api_key is accepted on create
// and immediately encrypted; it is never returned in responses.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Deserialize;

use crate::errors::RecalldResult;
use crate::llm::config_repo::{ConfigType, ModelConfig, ProviderConfig};
use crate::llm::provider::ProviderKind;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProviderRequest {
    pub provider_kind: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateModelRequest {
    pub provider_config_id: String,
    pub config_type: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    #[serde(default)]
    pub is_default: bool,
}

pub async fn create_provider(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateProviderRequest>,
) -> RecalldResult<Json<ProviderConfig>> {
    let provider_kind: ProviderKind = request
        .provider_kind
        .parse()
        .map_err(crate::errors::RecalldError::Internal)?;

    let created = state
        .configs
        .create_provider(
            provider_kind,
            request.base_url.as_deref(),
            request.api_key.as_deref(),
            state.cipher.as_deref(),
        )
        .await?;
    Ok(Json(created))
}

pub async fn create_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateModelRequest>,
) -> RecalldResult<Json<ModelConfig>> {
    let config_type = parse_config_type(&request.config_type)?;
    let created = state
        .configs
        .create_model(
            &request.provider_config_id,
            config_type,
            &request.model,
            request.max_tokens,
            request.temperature,
            request.is_default,
        )
        .await?;
    Ok(Json(created))
}

fn parse_config_type(raw: &str) -> RecalldResult<ConfigType> {
    match raw {
        "chat" => Ok(ConfigType::Chat),
        "summarize" => Ok(ConfigType::Summarize),
        "embedding" => Ok(ConfigType::Embedding),
        other => Err(crate::errors::RecalldError::Validation(format!("unknown config_type: {other}"))),
    }
}
