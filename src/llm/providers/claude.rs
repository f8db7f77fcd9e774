// src/llm/providers/claude.rs
// Anthropic Messages API shape: system prompt is a top-level field, not a
// message with role "system".

use async_stream::stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::json;

use crate::llm::provider::{ChatRequest, ChatResponse, LlmAdapter, ProviderKind, StreamChunk, TokenUsage};

pub struct ClaudeAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ClaudeAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    fn split_system(request: &ChatRequest) -> (Option<String>, Vec<serde_json::Value>) {
        let mut system = None;
        let mut messages = Vec::new();
        for m in &request.messages {
            if m.role == "system" {
                system = Some(m.content.clone());
            } else {
                messages.push(json!({"role": m.role, "content": m.content}));
            }
        }
        (system, messages)
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: i64,
    #[serde(default)]
    output_tokens: i64,
}

#[async_trait]
impl LlmAdapter for ClaudeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatResponse> {
        let (system, messages) = Self::split_system(&request);
        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<MessagesResponse>()
            .await?;

        let content = response
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(ChatResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: response.usage.input_tokens,
                completion_tokens: response.usage.output_tokens,
                total_tokens: response.usage.input_tokens + response.usage.output_tokens,
            },
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> anyhow::Result<BoxStream<'static, StreamChunk>> {
        use futures_util::StreamExt;

        let (system, messages) = Self::split_system(&request);
        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
            "stream": true,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
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
                    if !line.starts_with("data: ") {
                        continue;
                    }
                    let data = &line[6..];
                    if let Ok(value) = serde_json::from_str::<serde_json::Value>(data) {
                        if value.get("type").and_then(|t| t.as_str()) == Some("content_block_delta") {
                            if let Some(delta) = value.pointer("/delta/text").and_then(|v| v.as_str()) {
                                accumulated.push_str(delta);
                                yield StreamChunk::Delta(delta.to_string());
                            }
                        }
                        if value.get("type").and_then(|t| t.as_str()) == Some("message_stop") {
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

    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Err(anyhow::anyhow!("Claude provider does not support embeddings"))
    }
}
