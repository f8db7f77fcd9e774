// src/db/mod.rs
// Relational store bootstrap: opens the pool and idempotently creates schema.

mod schema;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

pub async fn open(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    bootstrap(&pool).await?;
    info!("relational store ready");
    Ok(pool)
}

async fn bootstrap(pool: &SqlitePool) -> anyhow::Result<()> {
    for statement in schema::STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
