// tests/scenarios.rs
// End-to-end scenarios over MemoryManager, exercising extraction, conflict
// resolution, promotion, expiry, and detached-task completion against a real
// SQLite pool and a real (file-backed) vector index. LLM calls are replayed
// via ScriptedAdapter; embeddings via ScriptedEmbedder, so these run fully
// offline and deterministically.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use recalld::config::MemoryConfig;
use recalld::db;
use recalld::llm::provider::LlmAdapter;
use recalld::memory::knowledge_repo::KnowledgeRepository;
use recalld::memory::manager::{AddKnowledgeOptions, MemoryManager, SearchKnowledgeOptions};
use recalld::memory::session_repo::SessionRepository;
use recalld::memory::types::{Category, Knowledge, Source, Tier};
use recalld::memory::vector_index::VectorIndex;
use recalld::testing::{ScriptedAdapter, ScriptedEmbedder};

struct Env {
    manager: MemoryManager,
    knowledge: KnowledgeRepository,
    #[allow(dead_code)]
    sessions: SessionRepository,
    config: MemoryConfig,
    _tempdir: tempfile::TempDir,
}

async fn env() -> Env {
    env_with_config(MemoryConfig::default()).await
}

async fn env_with_config(config: MemoryConfig) -> Env {
    let pool = db::open("sqlite::memory:").await.unwrap();
    let tempdir = tempfile::tempdir().unwrap();
    let vector_index = Arc::new(VectorIndex::load(tempdir.path().join("vectors.json")).unwrap());

    let knowledge_repo = Arc::new(KnowledgeRepository::new(pool.clone()));
    let session_repo = Arc::new(SessionRepository::new(pool.clone()));

    let manager = MemoryManager::new(
        knowledge_repo.clone(),
        session_repo.clone(),
        vector_index,
        Some(Arc::new(ScriptedEmbedder::new(64))),
        config.clone(),
    );

    Env {
        manager,
        knowledge: KnowledgeRepository::new(pool.clone()),
        sessions: SessionRepository::new(pool),
        config,
        _tempdir: tempdir,
    }
}

/// Polls `check` until it reports true or a short budget is exhausted — used
/// to await the detached embedding task that `add_knowledge`/`process_conversation`
/// spawn rather than asserting against a race.
async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn adapter(responses: Vec<&str>) -> Arc<dyn LlmAdapter> {
    Arc::new(ScriptedAdapter::new(responses))
}

/// S1 — first user fact, no prior knowledge: extraction runs, yields one fact,
/// and since no similar candidates exist the conflict check short-circuits to
/// Create without a second model call (ScriptedAdapter only needs one reply).
#[tokio::test]
async fn s1_first_user_fact_is_created() {
    let env = env().await;
    let llm = adapter(vec![
        r#"[{"content": "user's name is Zhang San and they are an engineer", "category": "personal_info", "importance": 0.9}]"#,
    ]);

    env.manager
        .process_conversation("My name is Zhang San, I'm an engineer.", "Nice to meet you, Zhang San!", &llm, "test-model")
        .await;

    wait_until(|| async { env.knowledge.count_active().await.unwrap_or(0) > 0 }).await;

    let active = env.knowledge.get_all_active(10).await.unwrap();
    assert_eq!(active.len(), 1);
    assert!(active[0].content.contains("Zhang San"));
    assert_eq!(active[0].category, Category::PersonalInfo);
}

/// S2 — conflict → UPDATE. Seed "user lives in beijing" (word-overlapping
/// content so the stub embedder's bag-of-words cosine clears the similarity
/// threshold); a new fact about moving to Shanghai is judged a conflict
/// against it. The old row is superseded; only Shanghai remains active.
#[tokio::test]
async fn s2_conflicting_fact_supersedes_the_old_one() {
    let env = env_with_config(MemoryConfig {
        similar_knowledge_threshold: 0.5,
        ..MemoryConfig::default()
    })
    .await;

    let beijing = env
        .manager
        .add_knowledge(AddKnowledgeOptions {
            content: "user city residence location beijing".to_string(),
            category: Category::PersonalInfo,
            source: Source::Manual,
            importance: Some(0.8),
            tier: Some(Tier::Long),
        })
        .await
        .unwrap();

    wait_until(|| async {
        env.manager
            .search_knowledge(SearchKnowledgeOptions {
                query: "user city residence location beijing".to_string(),
                categories: vec![],
                active_only: true,
                min_score: 0.0,
                limit: 10,
            })
            .await
            .map(|hits| !hits.is_empty())
            .unwrap_or(false)
    })
    .await;

    let llm = adapter(vec![
        r#"[{"content": "user city residence location shanghai", "category": "personal_info", "importance": 0.9}]"#,
        r#"{"is_duplicate": false, "is_conflict": true, "conflict_index": 0}"#,
    ]);

    env.manager
        .process_conversation("I moved to Shanghai.", "Got it, noted your new city.", &llm, "test-model")
        .await;

    wait_until(|| async {
        env.knowledge
            .get_all_active(10)
            .await
            .unwrap()
            .iter()
            .any(|k| k.content.contains("shanghai"))
    })
    .await;

    let active = env.knowledge.get_all_active(10).await.unwrap();
    assert!(active.iter().any(|k| k.content.contains("shanghai")));
    assert!(active.iter().all(|k| k.id != beijing.id), "beijing row should no longer be active");

    let beijing_reloaded = env.knowledge.get_by_id(&beijing.id).await.unwrap().unwrap();
    assert!(!beijing_reloaded.is_active());
}

/// S3 — duplicate → SKIP. A near-identical fact is judged a duplicate of
/// existing knowledge; active knowledge count is unchanged.
#[tokio::test]
async fn s3_duplicate_fact_is_skipped() {
    let env = env_with_config(MemoryConfig {
        similar_knowledge_threshold: 0.5,
        ..MemoryConfig::default()
    })
    .await;

    env.manager
        .add_knowledge(AddKnowledgeOptions {
            content: "user enjoys drinking coffee every morning".to_string(),
            category: Category::Preference,
            source: Source::Manual,
            importance: Some(0.6),
            tier: Some(Tier::Mid),
        })
        .await
        .unwrap();

    wait_until(|| async { env.knowledge.count_active().await.unwrap_or(0) >= 1 }).await;
    let before = env.knowledge.count_active().await.unwrap();

    let llm = adapter(vec![
        r#"[{"content": "user enjoys drinking coffee", "category": "preference", "importance": 0.6}]"#,
        r#"{"is_duplicate": true, "is_conflict": false, "conflict_index": null}"#,
    ]);

    env.manager
        .process_conversation("I like drinking coffee.", "Coffee is great!", &llm, "test-model")
        .await;

    // Skip never calls add_knowledge, so there is no background task racing
    // here — a short settle delay is still defensive against scheduling jitter.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after = env.knowledge.count_active().await.unwrap();
    assert_eq!(before, after);
}

/// S4 — mid-term promotion. A mid-tier entry accumulates hits up to the
/// configured threshold and is promoted to `long` with `promoted_at` set.
#[tokio::test]
async fn s4_mid_term_entry_promotes_after_enough_hits() {
    let env = env_with_config(MemoryConfig {
        mid_term_promote_hits: 2,
        ..MemoryConfig::default()
    })
    .await;

    let now = Utc::now();
    let knowledge = Knowledge {
        id: uuid::Uuid::new_v4().to_string(),
        content: "user prefers window seats".to_string(),
        category: Category::Preference,
        source: Source::Manual,
        superseded_by: None,
        tier: Tier::Mid,
        hit_count: 0,
        last_hit_at: None,
        promoted_at: None,
        importance: 0.4,
        created_at: now,
        updated_at: now,
    };
    env.knowledge.create(&knowledge).await.unwrap();

    env.manager.record_knowledge_hit(&knowledge.id).await.unwrap();
    let mid = env.knowledge.get_by_id(&knowledge.id).await.unwrap().unwrap();
    assert_eq!(mid.tier, Tier::Mid);

    env.manager.record_knowledge_hit(&knowledge.id).await.unwrap();

    let promoted = env.knowledge.get_by_id(&knowledge.id).await.unwrap().unwrap();
    assert_eq!(promoted.tier, Tier::Long);
    assert!(promoted.promoted_at.is_some());
    assert_eq!(promoted.hit_count, env.config.mid_term_promote_hits);
}

/// S5 — mid-term expiry. A stale, un-promoted mid-tier entry older than the
/// expiry window is deleted by cleanup; a fresh one survives.
#[tokio::test]
async fn s5_stale_mid_term_entry_is_deleted_by_cleanup() {
    let env = env().await;

    let now = Utc::now();
    let stale_created = now - chrono::Duration::days(env.config.mid_term_expire_days + 1);
    let stale = Knowledge {
        id: uuid::Uuid::new_v4().to_string(),
        content: "user mentioned a one-off event".to_string(),
        category: Category::Event,
        source: Source::Manual,
        superseded_by: None,
        tier: Tier::Mid,
        hit_count: 0,
        last_hit_at: None,
        promoted_at: None,
        importance: 0.4,
        created_at: stale_created,
        updated_at: stale_created,
    };
    env.knowledge.create(&stale).await.unwrap();

    let fresh = Knowledge {
        id: uuid::Uuid::new_v4().to_string(),
        content: "user mentioned another event".to_string(),
        category: Category::Event,
        source: Source::Manual,
        superseded_by: None,
        tier: Tier::Mid,
        hit_count: 0,
        last_hit_at: None,
        promoted_at: None,
        importance: 0.4,
        created_at: now,
        updated_at: now,
    };
    env.knowledge.create(&fresh).await.unwrap();

    let deleted = env.manager.cleanup_expired_mid_term().await.unwrap();
    assert_eq!(deleted, 1);

    assert!(env.knowledge.get_by_id(&stale.id).await.unwrap().is_none());
    assert!(env.knowledge.get_by_id(&fresh.id).await.unwrap().is_some());
}

/// S6 — cancellation/detachment. process_conversation is spawned the same way
/// the orchestrator spawns it (detached, not tied to a request-scoped future);
/// even though the caller only awaits the JoinHandle (standing in for a client
/// that has already disconnected by the time this finishes), the extracted
/// knowledge is still persisted because the task runs independently.
#[tokio::test]
async fn s6_detached_process_conversation_completes_independently() {
    let env = env().await;
    let llm = adapter(vec![
        r#"[{"content": "user's favorite color is blue", "category": "preference", "importance": 0.8}]"#,
    ]);

    let manager = Arc::new(env.manager);
    let handle = tokio::spawn({
        let manager = manager.clone();
        let llm = llm.clone();
        async move {
            manager
                .process_conversation("My favorite color is blue.", "Blue is a great color.", &llm, "test-model")
                .await;
        }
    });

    handle.await.unwrap();

    let active = env.knowledge.get_all_active(10).await.unwrap();
    assert!(active.iter().any(|k| k.content.contains("blue")));
}
