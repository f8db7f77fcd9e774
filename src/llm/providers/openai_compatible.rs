// src/llm/providers/openai_compatible.rs
// Shared implementation for OpenAI-compatible and Azure OpenAI endpoints — they
// differ only in URL shape and auth header.

use async_stream::stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::json;

use crate::llm::provider::{ChatRequest, ChatResponse, LlmAdapter, ProviderKind, StreamChunk, TokenUsage};

pub struct OpenAiCompatibleAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    is_azure: bool,
}

impl OpenAiCompatibleAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            is_azure: false,
        }
    }

    pub fn azure(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            is_azure: true,
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.is_azure {
            builder.header("api-key", &self.api_key)
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }

    fn body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let messages: Vec<_> = request
            .messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();

        json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": stream,
        })
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
    #[serde(default)]
    total_tokens: i64,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait]
impl LlmAdapter for OpenAiCompatibleAdapter {
    fn kind(&self) -> ProviderKind {
        if self.is_azure {
            ProviderKind::Azure
        } else {
            ProviderKind::OpenAiCompatible
        }
    }

    async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatResponse> {
        let body = self.body(&request, false);
        let response = self
            .apply_auth(self.client.post(self.chat_completions_url()))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<CompletionResponse>()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: response.usage.prompt_tokens,
                completion_tokens: response.usage.completion_tokens,
                total_tokens: response.usage.total_tokens,
            },
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> anyhow::Result<BoxStream<'static, StreamChunk>> {
        use futures_util::StreamExt;

        let body = self.body(&request, true);
        let response = self
            .apply_auth(self.client.post(self.chat_completions_url()))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let mut byte_stream = response.bytes_stream();

        let s = stream! {
            let mut buffer = String::new();
            let mut accumulated = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield StreamChunk::Error(e.to_string());
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    if line.is_empty() || !line.starts_with("data: ") {
                        continue;
                    }
                    let data = &line[6..];
                    if data == "[DONE]" {
                        yield StreamChunk::Done {
                            content: accumulated.clone(),
                            usage: TokenUsage::default(),
                        };
                        return;
                    }
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(data) {
                        if let Some(delta) = value
                            .pointer("/choices/0/delta/content")
                            .and_then(|v| v.as_str())
                        {
                            accumulated.push_str(delta);
                            yield StreamChunk::Delta(delta.to_string());
                        }
                    }
                }
            }

            yield StreamChunk::Done {
                content: accumulated,
                usage: TokenUsage::default(),
            };
        };

        Ok(Box::pin(s))
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        #[derive(Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingObject>,
        }
        #[derive(Deserialize)]
        struct EmbeddingObject {
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .apply_auth(self.client.post(url))
            .json(&json!({"model": "text-embedding-3-small", "input": text}))
            .send()
            .await?
            .error_for_status()?
            .json::<EmbeddingResponse>()
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|o| o.embedding)
            .ok_or_else(|| anyhow::anyhow!("embedding response had no data"))
    }
}

