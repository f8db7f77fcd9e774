// src/db/schema.rs
// Hand-written schema, run in order at pool-open time. No migration framework —
// every statement is idempotent so repeated boots are harmless.

pub const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        config_id TEXT,
        summary TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS turns (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_turns_session_created ON turns(session_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS knowledge (
        id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        category TEXT NOT NULL,
        source TEXT NOT NULL,
        importance REAL NOT NULL,
        superseded_by TEXT,
        tier TEXT NOT NULL,
        hit_count INTEGER NOT NULL DEFAULT 0,
        last_hit_at INTEGER,
        promoted_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_knowledge_tier ON knowledge(tier, superseded_by)",
    r#"
    CREATE TABLE IF NOT EXISTS provider_configs (
        id TEXT PRIMARY KEY,
        provider_kind TEXT NOT NULL,
        base_url TEXT,
        api_key_ciphertext TEXT,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS model_configs (
        id TEXT PRIMARY KEY,
        provider_config_id TEXT NOT NULL REFERENCES provider_configs(id) ON DELETE CASCADE,
        config_type TEXT NOT NULL,
        model TEXT NOT NULL,
        max_tokens INTEGER,
        temperature REAL,
        is_default INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_model_configs_type ON model_configs(config_type, is_default)",
];
