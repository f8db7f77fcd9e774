// src/llm/mod.rs

pub mod config_repo;
pub mod provider;
pub mod providers;

use std::sync::Arc;

use crate::llm::config_repo::ResolvedModelConfig;
use crate::llm::provider::{LlmAdapter, ProviderKind};
use crate::llm::providers::{claude::ClaudeAdapter, ollama::OllamaAdapter, openai_compatible::OpenAiCompatibleAdapter};

/// Constructs a concrete adapter for a resolved model configuration.
pub fn build(resolved: &ResolvedModelConfig) -> anyhow::Result<Arc<dyn LlmAdapter>> {
    let base_url = resolved
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url(resolved.provider_kind));
    let api_key = resolved.api_key.clone().unwrap_or_default();

    let adapter: Arc<dyn LlmAdapter> = match resolved.provider_kind {
        ProviderKind::OpenAiCompatible => Arc::new(OpenAiCompatibleAdapter::new(base_url, api_key)),
        ProviderKind::Azure => Arc::new(OpenAiCompatibleAdapter::azure(base_url, api_key)),
        ProviderKind::Claude => Arc::new(ClaudeAdapter::new(base_url, api_key)),
        ProviderKind::Ollama => Arc::new(OllamaAdapter::new(base_url)),
    };
    Ok(adapter)
}

fn default_base_url(kind: ProviderKind) -> String {
    match kind {
        ProviderKind::OpenAiCompatible => "https://api.openai.com/v1".to_string(),
        ProviderKind::Azure => "https://api.openai.com/v1".to_string(),
        ProviderKind::Claude => "https://api.anthropic.com".to_string(),
        ProviderKind::Ollama => "http://localhost:11434".to_string(),
    }
}
