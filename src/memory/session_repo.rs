// src/memory/session_repo.rs
// Repository for sessions and their turns.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{RecalldError, RecalldResult};
use crate::memory::types::{Session, Turn};

pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, title: &str, config_id: Option<&str>) -> RecalldResult<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            config_id: config_id.map(str::to_string),
            summary: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO sessions (id, title, config_id, summary, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.title)
        .bind(&session.config_id)
        .bind(&session.summary)
        .bind(session.created_at.timestamp())
        .bind(session.updated_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn get(&self, id: &str) -> RecalldResult<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_session).transpose()?)
    }

    pub async fn list(&self, limit: i64) -> RecalldResult<Vec<Session>> {
        let rows = sqlx::query("SELECT * FROM sessions ORDER BY updated_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_session).collect()
    }

    pub async fn touch(&self, id: &str) -> RecalldResult<()> {
        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_summary(&self, id: &str, summary: &str) -> RecalldResult<()> {
        let result = sqlx::query("UPDATE sessions SET summary = ?, updated_at = ? WHERE id = ?")
            .bind(summary)
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RecalldError::NotFound(format!("session {id}")));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> RecalldResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn append_turn(&self, session_id: &str, role: &str, content: &str) -> RecalldResult<Turn> {
        let turn = Turn {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO turns (id, session_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&turn.id)
        .bind(&turn.session_id)
        .bind(&turn.role)
        .bind(&turn.content)
        .bind(turn.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(turn)
    }

    /// Most recent `limit` turns, returned chronologically ascending.
    pub async fn recent_turns(&self, session_id: &str, limit: i64) -> RecalldResult<Vec<Turn>> {
        let rows = sqlx::query(
            "SELECT * FROM turns WHERE session_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut turns: Vec<Turn> = rows.into_iter().map(row_to_turn).collect::<RecalldResult<_>>()?;
        turns.reverse();
        Ok(turns)
    }

    pub async fn all_turns(&self, session_id: &str) -> RecalldResult<Vec<Turn>> {
        let rows = sqlx::query("SELECT * FROM turns WHERE session_id = ? ORDER BY created_at ASC")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_turn).collect()
    }

    pub async fn delete_turn(&self, turn_id: &str) -> RecalldResult<()> {
        sqlx::query("DELETE FROM turns WHERE id = ?")
            .bind(turn_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_session(row: sqlx::sqlite::SqliteRow) -> RecalldResult<Session> {
    Ok(Session {
        id: row.get("id"),
        title: row.get("title"),
        config_id: row.get("config_id"),
        summary: row.get("summary"),
        created_at: timestamp(&row, "created_at"),
        updated_at: timestamp(&row, "updated_at"),
    })
}

fn row_to_turn(row: sqlx::sqlite::SqliteRow) -> RecalldResult<Turn> {
    Ok(Turn {
        id: row.get("id"),
        session_id: row.get("session_id"),
        role: row.get("role"),
        content: row.get("content"),
        created_at: timestamp(&row, "created_at"),
    })
}

fn timestamp(row: &sqlx::sqlite::SqliteRow, column: &str) -> DateTime<Utc> {
    DateTime::from_timestamp(row.get::<i64, _>(column), 0).unwrap_or_else(Utc::now)
}
