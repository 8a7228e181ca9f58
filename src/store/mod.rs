//! Storage abstraction for poll and content-block records.
//!
//! The [`Store`] trait is the contract the rest of the connector relies on:
//! query by field, save, and ordering. Backends persist the compact encoded
//! form produced by [`schema::encode`](crate::schema::encode) and run every
//! read back through [`schema::decode`](crate::schema::decode), so callers
//! only ever see latest-schema records.
//!
//! | Backend | Module |
//! |---------|--------|
//! | In-memory (tests, embedding) | [`memory`] |
//! | SQLite | [`sqlite`] |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{ContentBlock, PollRecord};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Field filters for [`Store::find_content`]. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    pub feed: Option<String>,
    pub hostname: Option<String>,
    pub import_failed: Option<bool>,
    pub limit: Option<usize>,
}

impl ContentQuery {
    pub fn for_feed(feed: impl Into<String>) -> Self {
        Self {
            feed: Some(feed.into()),
            ..Self::default()
        }
    }

    pub fn failed() -> Self {
        Self {
            import_failed: Some(true),
            ..Self::default()
        }
    }

    pub fn matches(&self, block: &ContentBlock) -> bool {
        self.feed.as_deref().map_or(true, |f| block.feed == f)
            && self.hostname.as_deref().map_or(true, |h| block.hostname == h)
            && self.import_failed.map_or(true, |b| block.import_failed == b)
    }
}

/// Persistence backend for the connector's records.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save_poll`](Store::save_poll) | Record a completed poll |
/// | [`last_poll`](Store::last_poll) | Most recent poll for a feed, by window end |
/// | [`list_polls`](Store::list_polls) | All polls for a feed, newest first |
/// | [`save_content`](Store::save_content) | Insert or replace a content block |
/// | [`get_content`](Store::get_content) | Fetch a content block by id |
/// | [`find_content`](Store::find_content) | Content blocks matching a query, oldest poll first |
#[async_trait]
pub trait Store: Send + Sync {
    async fn save_poll(&self, record: &PollRecord) -> Result<(), StoreError>;

    /// Returns the poll for `feed` with the greatest `end`, or `None` when
    /// the feed has never been polled.
    async fn last_poll(&self, feed: &str) -> Result<Option<PollRecord>, StoreError>;

    async fn list_polls(&self, feed: &str) -> Result<Vec<PollRecord>, StoreError>;

    async fn save_content(&self, block: &ContentBlock) -> Result<(), StoreError>;

    async fn get_content(&self, id: &str) -> Result<Option<ContentBlock>, StoreError>;

    async fn find_content(&self, query: &ContentQuery) -> Result<Vec<ContentBlock>, StoreError>;
}
