// src/llm/providers/ollama.rs
// Local Ollama endpoint — no API key, `/api/chat` and `/api/embeddings`.

use async_stream::stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::json;

use crate::llm::provider::{ChatRequest, ChatResponse, LlmAdapter, ProviderKind, StreamChunk, TokenUsage};

pub struct OllamaAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: i64,
    #[serde(default)]
    eval_count: i64,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl LlmAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatResponse> {
        let messages: Vec<_> = request
            .messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();

        let response = self
            .client
            .post(self.chat_url())
            .json(&json!({
                "model": request.model,
                "messages": messages,
                "stream": false,
                "options": {"temperature": request.temperature},
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<OllamaChatResponse>()
            .await?;

        Ok(ChatResponse {
            content: response.message.content,
            usage: TokenUsage {
                prompt_tokens: response.prompt_eval_count,
                completion_tokens: response.eval_count,
                total_tokens: response.prompt_eval_count + response.eval_count,
            },
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> anyhow::Result<BoxStream<'static, StreamChunk>> {
        use futures_util::StreamExt;

        let messages: Vec<_> = request
            .messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();

        let response = self
            .client
            .post(self.chat_url())
            .json(&json!({
                "model": request.model,
                "messages": messages,
                "stream": true,
                "options": {"temperature": request.temperature},
            }))
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
                    if line.is_empty() {
                        continue;
                    }
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) {
                        if let Some(delta) = value.pointer("/message/content").and_then(|v| v.as_str()) {
                            accumulated.push_str(delta);
                            yield StreamChunk::Delta(delta.to_string());
                        }
                        if value.get("done").and_then(|d| d.as_bool()) == Some(true) {
                            yield StreamChunk::Done {
                                content: accumulated.clone(),
                                usage: TokenUsage::default(),
                            };
                            return;
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
        struct EmbeddingsResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .json(&json!({"model": "nomic-embed-text", "prompt": text}))
            .send()
            .await?
            .error_for_status()?
            .json::<EmbeddingsResponse>()
            .await?;

        Ok(response.embedding)
    }
}
