//! Database table creation.
//!
//! Only creates tables and indexes; record-level schema upgrades happen at
//! read time in [`schema`](crate::schema). Safe to run repeatedly.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_tables(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS taxii_polls (
            id TEXT PRIMARY KEY,
            feed TEXT NOT NULL,
            end_ms INTEGER NOT NULL,
            doc TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS taxii_content (
            id TEXT PRIMARY KEY,
            feed TEXT NOT NULL,
            hostname TEXT NOT NULL,
            import_failed INTEGER NOT NULL DEFAULT 0,
            poll_time_ms INTEGER NOT NULL,
            doc TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS service_config (
            name TEXT PRIMARY KEY,
            config_json TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_taxii_polls_feed_end ON taxii_polls(feed, end_ms DESC)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_taxii_content_feed ON taxii_content(feed)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_taxii_content_failed ON taxii_content(import_failed)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
