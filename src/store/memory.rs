//! In-memory [`Store`] implementation.
//!
//! Holds the same encoded JSON documents a database backend would, behind
//! `std::sync::RwLock`, so minification and read-time migration behave
//! exactly as they do against SQLite.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::models::{ContentBlock, PollRecord};
use crate::schema::{decode, encode};

use super::{ContentQuery, Store};

pub struct InMemoryStore {
    polls: RwLock<Vec<Value>>,
    content: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            polls: RwLock::new(Vec::new()),
            content: RwLock::new(BTreeMap::new()),
        }
    }

    /// Stores a content document exactly as given, bypassing the encoder.
    ///
    /// Lets callers seed documents written at older schema versions.
    pub fn insert_raw_content(&self, id: &str, doc: Value) {
        self.content.write().unwrap().insert(id.to_string(), doc);
    }

    /// The stored (encoded) form of a content block.
    pub fn raw_content(&self, id: &str) -> Option<Value> {
        self.content.read().unwrap().get(id).cloned()
    }

    /// Stores a poll document exactly as given, bypassing the encoder.
    pub fn insert_raw_poll(&self, doc: Value) {
        self.polls.write().unwrap().push(doc);
    }

    /// Decodes the polls of one feed only; other feeds' documents are never
    /// read, matching the SQLite backend's `WHERE feed = ?`.
    fn decoded_polls(&self, feed: &str) -> Result<Vec<PollRecord>, StoreError> {
        let polls = self.polls.read().unwrap();
        let mut records = Vec::new();
        let matching = polls
            .iter()
            .filter(|doc| doc.get("feed").and_then(Value::as_str) == Some(feed));
        for doc in matching {
            records.push(decode(doc.clone())?);
        }
        Ok(records)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save_poll(&self, record: &PollRecord) -> Result<(), StoreError> {
        let doc = encode(record)?;
        self.polls.write().unwrap().push(doc);
        Ok(())
    }

    async fn last_poll(&self, feed: &str) -> Result<Option<PollRecord>, StoreError> {
        Ok(self
            .decoded_polls(feed)?
            .into_iter()
            .max_by_key(|r| r.end))
    }

    async fn list_polls(&self, feed: &str) -> Result<Vec<PollRecord>, StoreError> {
        let mut records = self.decoded_polls(feed)?;
        records.sort_by(|a, b| b.end.cmp(&a.end));
        Ok(records)
    }

    async fn save_content(&self, block: &ContentBlock) -> Result<(), StoreError> {
        let doc = encode(block)?;
        self.content.write().unwrap().insert(block.id.clone(), doc);
        Ok(())
    }

    async fn get_content(&self, id: &str) -> Result<Option<ContentBlock>, StoreError> {
        let doc = self.content.read().unwrap().get(id).cloned();
        match doc {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    async fn find_content(&self, query: &ContentQuery) -> Result<Vec<ContentBlock>, StoreError> {
        let docs: Vec<Value> = self.content.read().unwrap().values().cloned().collect();
        let mut blocks = Vec::new();
        for doc in docs {
            let block: ContentBlock = decode(doc)?;
            if query.matches(&block) {
                blocks.push(block);
            }
        }
        blocks.sort_by(|a, b| a.poll_time.cmp(&b.poll_time).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            blocks.truncate(limit);
        }
        Ok(blocks)
    }
}
