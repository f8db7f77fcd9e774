// src/llm/provider.rs
// Provider-agnostic chat/embedding capability. A tagged ProviderKind selects the
// concrete implementation rather than open inheritance, per spec.md §9.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAiCompatible,
    Claude,
    Azure,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAiCompatible => "openai_compatible",
            ProviderKind::Claude => "claude",
            ProviderKind::Azure => "azure",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai_compatible" | "openai" => Ok(ProviderKind::OpenAiCompatible),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "azure" => Ok(ProviderKind::Azure),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(anyhow::anyhow!("unknown provider kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub enum StreamChunk {
    Delta(String),
    Done { content: String, usage: TokenUsage },
    Error(String),
}

#[async_trait]
pub trait LlmAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatResponse>;

    async fn chat_stream(&self, request: ChatRequest) -> anyhow::Result<BoxStream<'static, StreamChunk>>;

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}
