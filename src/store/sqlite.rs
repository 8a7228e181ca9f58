//! SQLite-backed [`Store`] implementation.
//!
//! Each record is kept as its encoded JSON document in a `doc` column.
//! The fields the store filters and orders on are mirrored into plain
//! columns at write time (`feed`, `end_ms`, `poll_time_ms`, ...), so queries
//! never have to look inside the JSON.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::StoreError;
use crate::models::{ContentBlock, PollRecord};
use crate::schema::{decode, encode, Versioned};

use super::{ContentQuery, Store};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn decode_row<T: Versioned>(raw: &str) -> Result<T, StoreError> {
    let doc: Value = serde_json::from_str(raw)?;
    Ok(decode(doc)?)
}

#[async_trait]
impl Store for SqliteStore {
    async fn save_poll(&self, record: &PollRecord) -> Result<(), StoreError> {
        let doc = encode(record)?;
        sqlx::query("INSERT INTO taxii_polls (id, feed, end_ms, doc) VALUES (?, ?, ?, ?)")
            .bind(&record.id)
            .bind(&record.feed)
            .bind(record.end.timestamp_millis())
            .bind(doc.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn last_poll(&self, feed: &str) -> Result<Option<PollRecord>, StoreError> {
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT doc FROM taxii_polls WHERE feed = ? ORDER BY end_ms DESC LIMIT 1",
        )
        .bind(feed)
        .fetch_optional(&self.pool)
        .await?;

        raw.as_deref().map(decode_row).transpose()
    }

    async fn list_polls(&self, feed: &str) -> Result<Vec<PollRecord>, StoreError> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT doc FROM taxii_polls WHERE feed = ? ORDER BY end_ms DESC")
                .bind(feed)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(|raw| decode_row(raw)).collect()
    }

    async fn save_content(&self, block: &ContentBlock) -> Result<(), StoreError> {
        let doc = encode(block)?;
        sqlx::query(
            r#"
            INSERT INTO taxii_content (id, feed, hostname, import_failed, poll_time_ms, doc)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                feed = excluded.feed,
                hostname = excluded.hostname,
                import_failed = excluded.import_failed,
                poll_time_ms = excluded.poll_time_ms,
                doc = excluded.doc
            "#,
        )
        .bind(&block.id)
        .bind(&block.feed)
        .bind(&block.hostname)
        .bind(block.import_failed)
        .bind(block.poll_time.timestamp_millis())
        .bind(doc.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_content(&self, id: &str) -> Result<Option<ContentBlock>, StoreError> {
        let raw: Option<String> = sqlx::query_scalar("SELECT doc FROM taxii_content WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        raw.as_deref().map(decode_row).transpose()
    }

    async fn find_content(&self, query: &ContentQuery) -> Result<Vec<ContentBlock>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT doc FROM taxii_content WHERE 1 = 1");

        if let Some(feed) = &query.feed {
            qb.push(" AND feed = ").push_bind(feed.clone());
        }
        if let Some(hostname) = &query.hostname {
            qb.push(" AND hostname = ").push_bind(hostname.clone());
        }
        if let Some(failed) = query.import_failed {
            qb.push(" AND import_failed = ").push_bind(failed);
        }
        qb.push(" ORDER BY poll_time_ms ASC, id ASC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let raw: String = row.get("doc");
                decode_row(&raw)
            })
            .collect()
    }
}
