// src/memory/manager.rs
// Orchestrates the knowledge repository, vector index, embedder and processor:
// add / search / supersede / hit-record / promote / cleanup, plus BuildContext
// and ProcessConversation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::MemoryConfig;
use crate::errors::{RecalldError, RecalldResult};
use crate::llm::provider::{LlmAdapter, Message as LlmMessage};
use crate::memory::embedder::Embedder;
use crate::memory::knowledge_repo::KnowledgeRepository;
use crate::memory::processor::MemoryProcessor;
use crate::memory::session_repo::SessionRepository;
use crate::memory::types::{Category, ConflictAction, Knowledge, KnowledgeSearchHit, Source, Tier, Turn};
use crate::memory::vector_index::{SearchFilter, VectorDocument, VectorIndex, VectorMetadata, KNOWLEDGE_ROLE};

const CONTEXT_HEADER: &str = "Known user info:";

pub struct AddKnowledgeOptions {
    pub content: String,
    pub category: Category,
    pub source: Source,
    pub importance: Option<f32>,
    pub tier: Option<Tier>,
}

pub struct SearchKnowledgeOptions {
    pub query: String,
    pub categories: Vec<Category>,
    pub active_only: bool,
    pub min_score: f32,
    pub limit: usize,
}

pub struct MemoryManager {
    knowledge_repo: Arc<KnowledgeRepository>,
    session_repo: Arc<SessionRepository>,
    vector_index: Arc<VectorIndex>,
    embedder: Option<Arc<dyn Embedder>>,
    processor: MemoryProcessor,
    config: MemoryConfig,
}

impl MemoryManager {
    pub fn new(
        knowledge_repo: Arc<KnowledgeRepository>,
        session_repo: Arc<SessionRepository>,
        vector_index: Arc<VectorIndex>,
        embedder: Option<Arc<dyn Embedder>>,
        config: MemoryConfig,
    ) -> Self {
        let processor = MemoryProcessor::new(config.default_importance);
        Self {
            knowledge_repo,
            session_repo,
            vector_index,
            embedder,
            processor,
            config,
        }
    }

    pub async fn save_conversation_memory(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> RecalldResult<Turn> {
        if content.trim().is_empty() {
            return Err(RecalldError::Validation("turn content must not be empty".to_string()));
        }
        self.session_repo.append_turn(session_id, role, content).await
    }

    pub async fn add_knowledge(&self, opts: AddKnowledgeOptions) -> RecalldResult<Knowledge> {
        if opts.content.trim().is_empty() {
            return Err(RecalldError::Validation("knowledge content must not be empty".to_string()));
        }

        let importance = opts.importance.unwrap_or(self.config.default_importance);
        let tier = opts.tier.unwrap_or(if importance >= self.config.long_term_threshold {
            Tier::Long
        } else {
            Tier::Mid
        });

        let now = Utc::now();
        let knowledge = Knowledge {
            id: Uuid::new_v4().to_string(),
            content: opts.content.clone(),
            category: opts.category,
            source: opts.source,
            superseded_by: None,
            tier,
            hit_count: 0,
            last_hit_at: None,
            promoted_at: None,
            importance,
            created_at: now,
            updated_at: now,
        };

        self.knowledge_repo.create(&knowledge).await?;

        if let Some(embedder) = self.embedder.clone() {
            let vector_index = self.vector_index.clone();
            let id = knowledge.id.clone();
            let content = knowledge.content.clone();
            let category = opts.category.as_str().to_string();
            let source = opts.source.as_str().to_string();
            tokio::spawn(async move {
                match embedder.embed(&content).await {
                    Ok(embedding) => {
                        let doc = VectorDocument {
                            id: id.clone(),
                            content,
                            embedding,
                            meta_data: VectorMetadata {
                                session_id: None,
                                role: KNOWLEDGE_ROLE.to_string(),
                                category,
                                source,
                                importance,
                                is_active: true,
                                created_at: now.timestamp(),
                            },
                        };
                        if let Err(e) = vector_index.add(doc) {
                            warn!(error = %e, knowledge_id = %id, "failed to persist vector document");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, knowledge_id = %id, "embedding failed, knowledge will not surface in recall yet");
                    }
                }
            });
        }

        Ok(knowledge)
    }

    pub async fn search_knowledge(&self, opts: SearchKnowledgeOptions) -> RecalldResult<Vec<KnowledgeSearchHit>> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| RecalldError::Config("no embedder configured".to_string()))?;

        let query_vector = embedder
            .embed(&opts.query)
            .await
            .map_err(|e| RecalldError::Upstream(e.to_string()))?;

        let filter = SearchFilter {
            session_id: None,
            categories: opts.categories.iter().map(|c| c.as_str().to_string()).collect(),
            active_only: opts.active_only,
            min_score: opts.min_score,
        };

        let results = self.vector_index.search(&query_vector, opts.limit, &filter);

        let mut hits = Vec::with_capacity(results.len());
        for (doc, score) in results {
            if doc.meta_data.role != KNOWLEDGE_ROLE {
                continue;
            }
            match self.knowledge_repo.get_by_id(&doc.id).await? {
                Some(knowledge) => hits.push(KnowledgeSearchHit {
                    knowledge,
                    score,
                    distance: 1.0 - score,
                }),
                None => debug!(id = %doc.id, "vector document has no matching knowledge row, skipping"),
            }
        }
        Ok(hits)
    }

    pub async fn build_context(&self, session_id: &str, query: &str) -> RecalldResult<Vec<LlmMessage>> {
        let recent_turns = self
            .session_repo
            .recent_turns(session_id, self.config.recent_memory_limit)
            .await?;

        let mut retained_ids = Vec::new();
        let mut messages = Vec::new();

        if self.embedder.is_some() && !query.trim().is_empty() {
            let hits = self
                .search_knowledge(SearchKnowledgeOptions {
                    query: query.to_string(),
                    categories: vec![Category::PersonalInfo, Category::Preference, Category::Fact],
                    active_only: true,
                    min_score: self.config.context_relevance_threshold,
                    limit: self.config.context_knowledge_limit as usize,
                })
                .await?;

            let retained: Vec<_> = hits
                .into_iter()
                .filter(|h| h.knowledge.content != query)
                .take(self.config.max_knowledge_in_context)
                .collect();

            if !retained.is_empty() {
                let bullets = retained
                    .iter()
                    .map(|h| format!("- {}", h.knowledge.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                messages.push(LlmMessage::system(format!("{CONTEXT_HEADER}\n{bullets}")));
                retained_ids.extend(retained.iter().map(|h| h.knowledge.id.clone()));
            }
        }

        for turn in recent_turns {
            if turn.role == "user" || turn.role == "assistant" {
                messages.push(LlmMessage {
                    role: turn.role,
                    content: turn.content,
                });
            }
        }

        if !retained_ids.is_empty() {
            let manager_ref = self.clone_refs();
            tokio::spawn(async move {
                for id in retained_ids {
                    if let Err(e) = manager_ref.record_knowledge_hit(&id).await {
                        warn!(error = %e, knowledge_id = %id, "failed to record knowledge hit");
                    }
                }
            });
        }

        Ok(messages)
    }

    pub async fn process_conversation(
        &self,
        user_msg: &str,
        assistant_msg: &str,
        llm: &Arc<dyn LlmAdapter>,
        model: &str,
    ) {
        if self.embedder.is_none() {
            return;
        }

        let facts = self.processor.extract_facts(user_msg, assistant_msg, llm, model).await;

        for fact in facts {
            if fact.importance < self.config.mid_term_threshold {
                continue;
            }
            let tier = if fact.importance >= self.config.long_term_threshold {
                Tier::Long
            } else {
                Tier::Mid
            };

            let similar = match self
                .search_knowledge(SearchKnowledgeOptions {
                    query: fact.content.clone(),
                    categories: vec![],
                    active_only: true,
                    min_score: self.config.similar_knowledge_threshold,
                    limit: self.config.conflict_check_limit as usize,
                })
                .await
            {
                // The pre-filter recall above only guarantees similar_knowledge_threshold;
                // DetectConflict additionally requires conflict_detection_threshold.
                Ok(hits) => hits
                    .into_iter()
                    .filter(|h| h.score >= self.config.conflict_detection_threshold)
                    .map(|h| h.knowledge)
                    .collect::<Vec<_>>(),
                Err(e) => {
                    error!(error = %e, "similarity recall failed for extracted fact");
                    continue;
                }
            };

            let decision = self.processor.detect_conflict(&fact, &similar, llm, model).await;

            match decision {
                ConflictAction::Skip => {}
                ConflictAction::Create => {
                    if let Err(e) = self
                        .add_knowledge(AddKnowledgeOptions {
                            content: fact.content.clone(),
                            category: fact.category,
                            source: Source::Extracted,
                            importance: Some(fact.importance),
                            tier: Some(tier),
                        })
                        .await
                    {
                        error!(error = %e, "failed to create knowledge from extracted fact");
                    }
                }
                ConflictAction::Update { conflict_id, .. } => {
                    match self
                        .add_knowledge(AddKnowledgeOptions {
                            content: fact.content.clone(),
                            category: fact.category,
                            source: Source::Extracted,
                            importance: Some(fact.importance),
                            tier: Some(tier),
                        })
                        .await
                    {
                        Ok(new_knowledge) => {
                            if let Err(e) = self.supersede_knowledge(&conflict_id, &new_knowledge.id).await {
                                error!(error = %e, "failed to supersede conflicting knowledge");
                            }
                        }
                        Err(e) => error!(error = %e, "failed to create replacement knowledge"),
                    }
                }
            }
        }
    }

    /// Removes the relational row and its mirrored vector document together —
    /// unlike `supersede_knowledge`, which only deactivates the vector entry,
    /// a deletion must not leave an orphaned document behind.
    pub async fn delete_knowledge(&self, id: &str) -> RecalldResult<()> {
        self.knowledge_repo.delete(id).await?;
        self.vector_index.delete(id)
    }

    pub async fn supersede_knowledge(&self, old_id: &str, new_id: &str) -> RecalldResult<()> {
        self.knowledge_repo.supersede(old_id, new_id).await?;

        if let Some(mut doc) = self.vector_index.get(old_id) {
            doc.meta_data.is_active = false;
            self.vector_index.update_metadata(old_id, doc.meta_data)?;
        }
        Ok(())
    }

    pub async fn record_knowledge_hit(&self, id: &str) -> RecalldResult<()> {
        self.knowledge_repo.record_hit(id).await?;

        if let Some(knowledge) = self.knowledge_repo.get_by_id(id).await? {
            if knowledge.tier == Tier::Mid && knowledge.hit_count >= self.config.mid_term_promote_hits {
                self.promote_to_long_term(id).await?;
            }
        }
        Ok(())
    }

    pub async fn promote_to_long_term(&self, id: &str) -> RecalldResult<()> {
        self.knowledge_repo.promote_to_long_term(id).await?;

        if let Some(mut doc) = self.vector_index.get(id) {
            doc.meta_data.importance = doc.meta_data.importance.max(self.config.long_term_threshold);
            self.vector_index.update_metadata(id, doc.meta_data)?;
        }
        Ok(())
    }

    pub async fn cleanup_expired_mid_term(&self) -> RecalldResult<u64> {
        self.knowledge_repo
            .delete_expired_mid_term(self.config.mid_term_expire_days)
            .await
    }

    pub async fn promote_eligible_mid_term(&self) -> RecalldResult<usize> {
        let ready = self
            .knowledge_repo
            .get_mid_term_ready_for_promotion(self.config.mid_term_promote_hits)
            .await?;

        let mut promoted = 0;
        for knowledge in ready {
            if let Err(e) = self.promote_to_long_term(&knowledge.id).await {
                error!(error = %e, knowledge_id = %knowledge.id, "failed to promote eligible knowledge");
            } else {
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    fn clone_refs(&self) -> Self {
        Self {
            knowledge_repo: self.knowledge_repo.clone(),
            session_repo: self.session_repo.clone(),
            vector_index: self.vector_index.clone(),
            embedder: self.embedder.clone(),
            processor: MemoryProcessor::new(self.config.default_importance),
            config: self.config.clone(),
        }
    }
}
