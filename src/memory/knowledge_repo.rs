// src/memory/knowledge_repo.rs
// Typed queries over the knowledge table. "Active" means superseded_by is null.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::errors::{RecalldError, RecalldResult};
use crate::memory::types::{Category, Knowledge, Source, Tier};

pub struct KnowledgeRepository {
    pool: SqlitePool,
}

impl KnowledgeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, knowledge: &Knowledge) -> RecalldResult<()> {
        sqlx::query(
            r#"
            INSERT INTO knowledge (
                id, content, category, source, importance, superseded_by, tier,
                hit_count, last_hit_at, promoted_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&knowledge.id)
        .bind(&knowledge.content)
        .bind(knowledge.category.as_str())
        .bind(knowledge.source.as_str())
        .bind(knowledge.importance)
        .bind(&knowledge.superseded_by)
        .bind(knowledge.tier.as_str())
        .bind(knowledge.hit_count)
        .bind(knowledge.last_hit_at.map(|t| t.timestamp()))
        .bind(knowledge.promoted_at.map(|t| t.timestamp()))
        .bind(knowledge.created_at.timestamp())
        .bind(knowledge.updated_at.timestamp())
        .execute(&self.pool)
        .await?;

        debug!(id = %knowledge.id, "created knowledge row");
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> RecalldResult<Option<Knowledge>> {
        let row = sqlx::query("SELECT * FROM knowledge WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_knowledge).transpose()?)
    }

    pub async fn update(&self, knowledge: &Knowledge) -> RecalldResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE knowledge SET
                content = ?, category = ?, source = ?, importance = ?,
                superseded_by = ?, tier = ?, hit_count = ?, last_hit_at = ?,
                promoted_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&knowledge.content)
        .bind(knowledge.category.as_str())
        .bind(knowledge.source.as_str())
        .bind(knowledge.importance)
        .bind(&knowledge.superseded_by)
        .bind(knowledge.tier.as_str())
        .bind(knowledge.hit_count)
        .bind(knowledge.last_hit_at.map(|t| t.timestamp()))
        .bind(knowledge.promoted_at.map(|t| t.timestamp()))
        .bind(Utc::now().timestamp())
        .bind(&knowledge.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RecalldError::NotFound(format!("knowledge {}", knowledge.id)));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> RecalldResult<()> {
        sqlx::query("DELETE FROM knowledge WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_all(&self, limit: i64) -> RecalldResult<Vec<Knowledge>> {
        let rows = sqlx::query("SELECT * FROM knowledge ORDER BY created_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_knowledge).collect()
    }

    pub async fn get_all_active(&self, limit: i64) -> RecalldResult<Vec<Knowledge>> {
        let rows = sqlx::query(
            "SELECT * FROM knowledge WHERE superseded_by IS NULL ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_knowledge).collect()
    }

    pub async fn count(&self) -> RecalldResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as c FROM knowledge")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("c"))
    }

    pub async fn count_active(&self) -> RecalldResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as c FROM knowledge WHERE superseded_by IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("c"))
    }

    pub async fn supersede(&self, old_id: &str, new_id: &str) -> RecalldResult<()> {
        sqlx::query("UPDATE knowledge SET superseded_by = ?, updated_at = ? WHERE id = ?")
            .bind(new_id)
            .bind(Utc::now().timestamp())
            .bind(old_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_hit(&self, id: &str) -> RecalldResult<()> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE knowledge SET hit_count = hit_count + 1, last_hit_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RecalldError::NotFound(format!("knowledge {id}")));
        }
        Ok(())
    }

    pub async fn promote_to_long_term(&self, id: &str) -> RecalldResult<()> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE knowledge SET tier = 'long', promoted_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RecalldError::NotFound(format!("knowledge {id}")));
        }
        Ok(())
    }

    pub async fn get_by_tier(
        &self,
        tier: Tier,
        active_only: bool,
        limit: i64,
    ) -> RecalldResult<Vec<Knowledge>> {
        let rows = if active_only {
            sqlx::query(
                "SELECT * FROM knowledge WHERE tier = ? AND superseded_by IS NULL ORDER BY created_at DESC LIMIT ?",
            )
            .bind(tier.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query("SELECT * FROM knowledge WHERE tier = ? ORDER BY created_at DESC LIMIT ?")
                .bind(tier.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        };
        rows.into_iter().map(row_to_knowledge).collect()
    }

    pub async fn get_mid_term_ready_for_promotion(&self, min_hits: i64) -> RecalldResult<Vec<Knowledge>> {
        let rows = sqlx::query(
            "SELECT * FROM knowledge WHERE tier = 'mid' AND superseded_by IS NULL AND hit_count >= ?",
        )
        .bind(min_hits)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_knowledge).collect()
    }

    /// Deletes active mid-tier rows whose `COALESCE(last_hit_at, created_at)` is
    /// older than `now - days`. Returns the number deleted.
    pub async fn delete_expired_mid_term(&self, days: i64) -> RecalldResult<u64> {
        let cutoff = Utc::now().timestamp() - days * 86_400;
        let result = sqlx::query(
            r#"
            DELETE FROM knowledge
            WHERE tier = 'mid'
              AND superseded_by IS NULL
              AND COALESCE(last_hit_at, created_at) < ?
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_knowledge(row: sqlx::sqlite::SqliteRow) -> RecalldResult<Knowledge> {
    let category_raw: String = row.get("category");
    let source_raw: String = row.get("source");
    let tier_raw: String = row.get("tier");
    let last_hit_at: Option<i64> = row.get("last_hit_at");
    let promoted_at: Option<i64> = row.get("promoted_at");

    Ok(Knowledge {
        id: row.get("id"),
        content: row.get("content"),
        category: category_raw
            .parse::<Category>()
            .map_err(RecalldError::Internal)?,
        source: source_raw.parse::<Source>().map_err(RecalldError::Internal)?,
        superseded_by: row.get("superseded_by"),
        tier: tier_raw.parse::<Tier>().map_err(RecalldError::Internal)?,
        hit_count: row.get("hit_count"),
        last_hit_at: last_hit_at.and_then(|t| DateTime::from_timestamp(t, 0)),
        promoted_at: promoted_at.and_then(|t| DateTime::from_timestamp(t, 0)),
        importance: row.get("importance"),
        created_at: DateTime::from_timestamp(row.get::<i64, _>("created_at"), 0)
            .unwrap_or_else(Utc::now),
        updated_at: DateTime::from_timestamp(row.get::<i64, _>("updated_at"), 0)
            .unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use uuid::Uuid;

    async fn test_pool() -> SqlitePool {
        db::open("sqlite::memory:").await.unwrap()
    }

    fn new_knowledge(content: &str, tier: Tier, importance: f32) -> Knowledge {
        let now = Utc::now();
        Knowledge {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            category: Category::Fact,
            source: Source::Manual,
            superseded_by: None,
            tier,
            hit_count: 0,
            last_hit_at: None,
            promoted_at: None,
            importance,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn supersession_marks_old_inactive() {
        let repo = KnowledgeRepository::new(test_pool().await);
        let old = new_knowledge("old fact", Tier::Mid, 0.5);
        let new = new_knowledge("new fact", Tier::Mid, 0.5);
        repo.create(&old).await.unwrap();
        repo.create(&new).await.unwrap();

        repo.supersede(&old.id, &new.id).await.unwrap();

        let reloaded = repo.get_by_id(&old.id).await.unwrap().unwrap();
        assert!(!reloaded.is_active());
        assert_eq!(reloaded.superseded_by.as_deref(), Some(new.id.as_str()));

        let active = repo.get_all_active(100).await.unwrap();
        assert!(active.iter().all(|k| k.id != old.id));
    }

    #[tokio::test]
    async fn promotion_sets_tier_and_promoted_at() {
        let repo = KnowledgeRepository::new(test_pool().await);
        let k = new_knowledge("promote me", Tier::Mid, 0.4);
        repo.create(&k).await.unwrap();

        for _ in 0..3 {
            repo.record_hit(&k.id).await.unwrap();
        }
        repo.promote_to_long_term(&k.id).await.unwrap();

        let reloaded = repo.get_by_id(&k.id).await.unwrap().unwrap();
        assert_eq!(reloaded.tier, Tier::Long);
        assert!(reloaded.promoted_at.is_some());
        assert_eq!(reloaded.hit_count, 3);
    }

    #[tokio::test]
    async fn expiry_deletes_only_stale_active_mid_tier() {
        let repo = KnowledgeRepository::new(test_pool().await);
        let mut stale = new_knowledge("stale", Tier::Mid, 0.4);
        stale.created_at = Utc::now() - chrono::Duration::days(31);
        repo.create(&stale).await.unwrap();

        let fresh = new_knowledge("fresh", Tier::Mid, 0.4);
        repo.create(&fresh).await.unwrap();

        let deleted = repo.delete_expired_mid_term(30).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(repo.get_by_id(&stale.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&fresh.id).await.unwrap().is_some());
    }
}
