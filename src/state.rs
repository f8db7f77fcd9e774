// src/state.rs
// Application state: constructed once at startup, shared behind Arc handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;
use crate::crypto::Cipher;
use crate::db;
use crate::llm::config_repo::ConfigRepository;
use crate::memory::embedder::{Embedder, OpenAiEmbedder};
use crate::memory::knowledge_repo::KnowledgeRepository;
use crate::memory::manager::MemoryManager;
use crate::memory::session_repo::SessionRepository;
use crate::memory::vector_index::VectorIndex;

pub struct AppState {
    pub config: AppConfig,
    pub memory: Arc<MemoryManager>,
    pub sessions: Arc<SessionRepository>,
    pub knowledge: Arc<KnowledgeRepository>,
    pub configs: Arc<ConfigRepository>,
    pub cipher: Option<Arc<Cipher>>,
    /// Background tasks (embedding, ProcessConversation, housekeeping) observe
    /// this instead of a request's cancellation token, so a disconnecting
    /// client never loses in-flight write-side work.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        config.validate()?;

        let pool = db::open(&config.database.url()).await?;
        info!("relational store opened at {}", config.database.path);

        let vector_index = Arc::new(VectorIndex::load(&config.vector.path)?);
        info!(count = vector_index.count(), "vector index loaded");

        let knowledge_repo = Arc::new(KnowledgeRepository::new(pool.clone()));
        let session_repo = Arc::new(SessionRepository::new(pool.clone()));
        let config_repo = Arc::new(ConfigRepository::new(pool.clone()));

        let cipher = if config.encryption.key.trim().is_empty() {
            None
        } else {
            Some(Arc::new(Cipher::from_base64_key(&config.encryption.key)?))
        };

        let embedder: Option<Arc<dyn Embedder>> = if config.embedding.base_url.is_some() {
            Some(Arc::new(OpenAiEmbedder::new(
                config.embedding.base_url.clone().unwrap(),
                std::env::var("RECALLD_EMBEDDING_API_KEY").unwrap_or_default(),
                config.embedding.model.clone(),
            )))
        } else {
            None
        };
        if embedder.is_none() {
            tracing::warn!("no embedding.base_url configured — knowledge search is disabled");
        }

        let memory = Arc::new(MemoryManager::new(
            knowledge_repo.clone(),
            session_repo.clone(),
            vector_index.clone(),
            embedder,
            config.memory.clone(),
        ));

        Ok(Arc::new(Self {
            config,
            memory,
            sessions: session_repo,
            knowledge: knowledge_repo,
            configs: config_repo,
            cipher,
            shutdown: CancellationToken::new(),
        }))
    }
}
