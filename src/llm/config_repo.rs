// src/llm/config_repo.rs
// Provider/model configuration CRUD. Read-only to the Memory Core; consumed by
// the Chat Orchestrator to resolve credentials for a given config_type.

use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::crypto::Cipher;
use crate::errors::{RecalldError, RecalldResult};
use crate::llm::provider::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigType {
    Chat,
    Summarize,
    Embedding,
}

impl ConfigType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::Chat => "chat",
            ConfigType::Summarize => "summarize",
            ConfigType::Embedding => "embedding",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfig {
    pub id: String,
    pub provider_kind: ProviderKind,
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key_ciphertext: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelConfig {
    pub id: String,
    pub provider_config_id: String,
    pub config_type: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub is_default: bool,
}

/// Fully resolved, ready-to-use credentials for one config_type.
#[derive(Debug, Clone)]
pub struct ResolvedModelConfig {
    pub provider_kind: ProviderKind,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

pub struct ConfigRepository {
    pool: SqlitePool,
}

impl ConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_provider(
        &self,
        provider_kind: ProviderKind,
        base_url: Option<&str>,
        api_key: Option<&str>,
        cipher: Option<&Cipher>,
    ) -> RecalldResult<ProviderConfig> {
        let ciphertext = match (api_key, cipher) {
            (Some(key), Some(cipher)) => Some(
                cipher
                    .encrypt(key)
                    .map_err(|e| RecalldError::Internal(anyhow::anyhow!(e)))?,
            ),
            (Some(_), None) => {
                return Err(RecalldError::Config(
                    "api_key provided but no encryption cipher configured".to_string(),
                ));
            }
            (None, _) => None,
        };

        let config = ProviderConfig {
            id: Uuid::new_v4().to_string(),
            provider_kind,
            base_url: base_url.map(str::to_string),
            api_key_ciphertext: ciphertext,
        };

        sqlx::query(
            "INSERT INTO provider_configs (id, provider_kind, base_url, api_key_ciphertext, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&config.id)
        .bind(config.provider_kind.as_str())
        .bind(&config.base_url)
        .bind(&config.api_key_ciphertext)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(config)
    }

    pub async fn create_model(
        &self,
        provider_config_id: &str,
        config_type: ConfigType,
        model: &str,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        is_default: bool,
    ) -> RecalldResult<ModelConfig> {
        let config = ModelConfig {
            id: Uuid::new_v4().to_string(),
            provider_config_id: provider_config_id.to_string(),
            config_type: config_type.as_str().to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
            is_default,
        };

        sqlx::query(
            r#"
            INSERT INTO model_configs (
                id, provider_config_id, config_type, model, max_tokens, temperature, is_default, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&config.id)
        .bind(&config.provider_config_id)
        .bind(&config.config_type)
        .bind(&config.model)
        .bind(config.max_tokens)
        .bind(config.temperature)
        .bind(config.is_default)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(config)
    }

    /// Explicit `model_config_id` wins; otherwise the default row for `config_type`.
    pub async fn resolve(
        &self,
        config_type: ConfigType,
        explicit_id: Option<&str>,
        cipher: Option<&Cipher>,
    ) -> RecalldResult<ResolvedModelConfig> {
        let row = match explicit_id {
            Some(id) => sqlx::query(
                r#"
                SELECT mc.model, mc.max_tokens, mc.temperature,
                       pc.provider_kind, pc.base_url, pc.api_key_ciphertext
                FROM model_configs mc
                JOIN provider_configs pc ON pc.id = mc.provider_config_id
                WHERE mc.id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?,
            None => sqlx::query(
                r#"
                SELECT mc.model, mc.max_tokens, mc.temperature,
                       pc.provider_kind, pc.base_url, pc.api_key_ciphertext
                FROM model_configs mc
                JOIN provider_configs pc ON pc.id = mc.provider_config_id
                WHERE mc.config_type = ? AND mc.is_default = 1
                LIMIT 1
                "#,
            )
            .bind(config_type.as_str())
            .fetch_optional(&self.pool)
            .await?,
        };

        let row = row.ok_or_else(|| {
            RecalldError::NotFound(format!(
                "no model config for type {}{}",
                config_type.as_str(),
                explicit_id.map(|i| format!(" (id={i})")).unwrap_or_default()
            ))
        })?;

        let provider_kind_raw: String = row.get("provider_kind");
        let ciphertext: Option<String> = row.get("api_key_ciphertext");

        let api_key = match (ciphertext, cipher) {
            (Some(ct), Some(cipher)) => Some(
                cipher
                    .decrypt(&ct)
                    .map_err(|e| RecalldError::Internal(anyhow::anyhow!(e)))?,
            ),
            (Some(_), None) => {
                return Err(RecalldError::Config(
                    "provider has an encrypted api_key but no cipher is configured".to_string(),
                ));
            }
            (None, _) => None,
        };

        Ok(ResolvedModelConfig {
            provider_kind: provider_kind_raw
                .parse()
                .map_err(RecalldError::Internal)?,
            base_url: row.get("base_url"),
            api_key,
            model: row.get("model"),
            max_tokens: row.get::<Option<i64>, _>("max_tokens").map(|v| v as u32),
            temperature: row.get("temperature"),
        })
    }
}
