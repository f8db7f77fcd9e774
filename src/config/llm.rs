// src/config/llm.rs
// Default generation parameters and encryption-at-rest configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream_buffer_size: usize,
    pub title_max_length: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            stream_buffer_size: 32,
            title_max_length: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Base64-encoded 32-byte key. Overridden by `LLM_AGENT_ENCRYPTION_KEY`.
    pub key: String,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self { key: String::new() }
    }
}
