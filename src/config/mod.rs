// src/config/mod.rs
// Central configuration for recalld — composes per-domain config structs.

pub mod helpers;
pub mod llm;
pub mod memory;
pub mod server;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use llm::{EncryptionConfig, LlmConfig};
pub use memory::{EmbeddingConfig, MemoryConfig};
pub use server::{DatabaseConfig, LoggingConfig, ServerConfig, VectorConfig};

/// Main configuration structure — composes all domain configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub vector: VectorConfig,
    pub embedding: EmbeddingConfig,
    pub memory: MemoryConfig,
    pub llm: LlmConfig,
    pub encryption: EncryptionConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            vector: VectorConfig::default(),
            embedding: EmbeddingConfig::default(),
            memory: MemoryConfig::default(),
            llm: LlmConfig::default(),
            encryption: EncryptionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a YAML file if present, otherwise fall back to defaults; apply
    /// environment-variable overrides on top, then validate.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .map_err(|e| anyhow::anyhow!("failed to read config file {:?}: {e}", p))?;
                serde_yaml::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("failed to parse config file {:?}: {e}", p))?
            }
            Some(p) => {
                tracing::warn!(path = ?p, "config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        helpers::env_override_parsed("RECALLD_HOST", &mut self.server.host);
        helpers::env_override_parsed("RECALLD_PORT", &mut self.server.port);
        helpers::env_override("RECALLD_MODE", &mut self.server.mode);
        helpers::env_override("RECALLD_DATABASE_PATH", &mut self.database.path);
        helpers::env_override("RECALLD_VECTOR_PATH", &mut self.vector.path);
        helpers::env_override("RECALLD_LOG_LEVEL", &mut self.logging.level);

        // The encryption key is the one value that must never live only in a
        // checked-in YAML file.
        if let Ok(key) = std::env::var("LLM_AGENT_ENCRYPTION_KEY") {
            self.encryption.key = key;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.server.validate()?;
        self.database.validate()?;
        self.memory.validate()?;
        Ok(())
    }
}
