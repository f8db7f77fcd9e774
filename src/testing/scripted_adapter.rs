// src/testing/scripted_adapter.rs
// FIFO-queued LlmAdapter for deterministic extraction/conflict tests.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::llm::provider::{ChatRequest, ChatResponse, LlmAdapter, ProviderKind, StreamChunk, TokenUsage};

/// Replays pre-scripted chat responses in order. Panics (via `expect`) if the
/// queue is exhausted — tests should script exactly as many turns as they drive.
pub struct ScriptedAdapter {
    responses: Mutex<Vec<String>>,
}

impl ScriptedAdapter {
    pub fn new(responses: Vec<impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).rev().collect()),
        }
    }

    fn next_response(&self) -> String {
        self.responses
            .lock()
            .unwrap()
            .pop()
            .expect("ScriptedAdapter: no more scripted responses queued")
    }
}

#[async_trait]
impl LlmAdapter for ScriptedAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiCompatible
    }

    async fn chat(&self, _request: ChatRequest) -> anyhow::Result<ChatResponse> {
        Ok(ChatResponse {
            content: self.next_response(),
            usage: TokenUsage::default(),
        })
    }

    async fn chat_stream(&self, _request: ChatRequest) -> anyhow::Result<BoxStream<'static, StreamChunk>> {
        let content = self.next_response();
        let chunks = vec![
            StreamChunk::Delta(content.clone()),
            StreamChunk::Done {
                content,
                usage: TokenUsage::default(),
            },
        ];
        Ok(stream::iter(chunks).boxed())
    }

    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Err(anyhow::anyhow!("ScriptedAdapter does not support embeddings; use ScriptedEmbedder"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_responses_in_order() {
        let adapter = ScriptedAdapter::new(vec!["first", "second"]);
        let req = ChatRequest {
            messages: vec![],
            model: "test".to_string(),
            max_tokens: 10,
            temperature: 0.0,
        };
        let first = adapter.chat(req.clone()).await.unwrap();
        let second = adapter.chat(req).await.unwrap();
        assert_eq!(first.content, "first");
        assert_eq!(second.content, "second");
    }

    #[tokio::test]
    #[should_panic(expected = "no more scripted responses queued")]
    async fn panics_when_queue_is_exhausted() {
        let adapter = ScriptedAdapter::new(Vec::<String>::new());
        let req = ChatRequest {
            messages: vec![],
            model: "test".to_string(),
            max_tokens: 10,
            temperature: 0.0,
        };
        let _ = adapter.chat(req).await;
    }
}
