// src/memory/types.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Mid,
    Long,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Mid => "mid",
            Tier::Long => "long",
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mid" => Ok(Tier::Mid),
            "long" => Ok(Tier::Long),
            other => Err(anyhow::anyhow!("unknown tier: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    PersonalInfo,
    Preference,
    Fact,
    Event,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::PersonalInfo => "personal_info",
            Category::Preference => "preference",
            Category::Fact => "fact",
            Category::Event => "event",
        }
    }

    /// Case-insensitive alias lookup; unknown values collapse to `Fact`.
    pub fn normalize(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "personal_info" | "personal" | "identity" => Category::PersonalInfo,
            "preference" | "like" | "dislike" => Category::Preference,
            "event" | "events" => Category::Event,
            "fact" | "facts" => Category::Fact,
            _ => Category::Fact,
        }
    }
}

impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Category::normalize(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Extracted,
    Manual,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Extracted => "extracted",
            Source::Manual => "manual",
        }
    }
}

impl std::str::FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extracted" => Ok(Source::Extracted),
            "manual" => Ok(Source::Manual),
            other => Err(anyhow::anyhow!("unknown source: {other}")),
        }
    }
}

/// A durable, declarative piece of user/world knowledge — distinct from a
/// conversational Turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Knowledge {
    pub id: String,
    pub content: String,
    pub category: Category,
    pub source: Source,
    pub superseded_by: Option<String>,
    pub tier: Tier,
    pub hit_count: i64,
    pub last_hit_at: Option<DateTime<Utc>>,
    pub promoted_at: Option<DateTime<Utc>>,
    pub importance: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Knowledge {
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none()
    }
}

/// A single verbatim user/assistant/system message within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub config_id: Option<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A fact extracted from a conversation turn, prior to reconciliation.
#[derive(Debug, Clone)]
pub struct Fact {
    pub content: String,
    pub category: Category,
    pub importance: f32,
}

/// Outcome of the model-judged conflict check.
#[derive(Debug, Clone)]
pub enum ConflictAction {
    Create,
    Skip,
    Update {
        conflict_id: String,
        #[allow(dead_code)]
        old_content: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeSearchHit {
    pub knowledge: Knowledge,
    pub score: f32,
    pub distance: f32,
}
