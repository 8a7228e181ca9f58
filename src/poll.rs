//! Poll cycle for one feed.
//!
//! Coordinates a single poll: window → transport → content blocks →
//! poll record. Each poll starts where the previous one for the same feed
//! ended, so the stored [`PollRecord`]s act as the feed's checkpoint.
//!
//! The TAXII exchange itself is behind [`TaxiiTransport`]. Overlapping
//! polls of one feed are not serialized here; the scheduler that invokes
//! [`run_poll`] owns that.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::StoreError;
use crate::models::{new_record_id, storage_time, ContentBlock, PollRecord};
use crate::service::{feed_key, FeedConfig, ServerConfig, ServiceConfig};
use crate::store::Store;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Time range requested from a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    /// End of the previous poll; `None` for a feed never polled before.
    pub begin: Option<DateTime<Utc>>,
    pub end: DateTime<Utc>,
}

impl PollWindow {
    /// Human-readable form stored on content blocks.
    pub fn describe(&self) -> String {
        match self.begin {
            Some(begin) => format!(
                "{} to {}",
                begin.format(TIME_FORMAT),
                self.end.format(TIME_FORMAT)
            ),
            None => format!("Beginning of time to {}", self.end.format(TIME_FORMAT)),
        }
    }
}

/// Computes the next window for `feed`, ending at `now`.
pub async fn poll_window(
    store: &dyn Store,
    feed: &str,
    now: DateTime<Utc>,
) -> Result<PollWindow, StoreError> {
    let begin = store.last_poll(feed).await?.map(|last| last.end);
    Ok(PollWindow {
        begin,
        end: storage_time(now),
    })
}

/// What the transport is asked to fetch.
#[derive(Debug)]
pub struct PollRequest<'a> {
    pub server_name: &'a str,
    pub server: &'a ServerConfig,
    pub feed: &'a FeedConfig,
    pub window: PollWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedBlock {
    pub label: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResponse {
    pub message_id: String,
    pub blocks: Vec<RetrievedBlock>,
}

/// Performs the TAXII poll exchange with a server.
#[async_trait]
pub trait TaxiiTransport: Send + Sync {
    async fn poll(&self, request: &PollRequest<'_>) -> Result<PollResponse>;
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub analyst: String,
    /// Stored on each block; prefer the STIX header's source on import.
    pub use_hdr_src: bool,
}

#[derive(Debug, Clone)]
pub struct PollSummary {
    pub feed: String,
    pub window: PollWindow,
    pub message_id: String,
    pub block_ids: Vec<String>,
}

/// Polls one configured feed and stores what it returns.
///
/// Content blocks are saved before the poll record, so a failure part-way
/// leaves the window open and the next poll covers it again. A transport
/// error stores nothing.
pub async fn run_poll(
    store: &dyn Store,
    transport: &dyn TaxiiTransport,
    config: &ServiceConfig,
    server_name: &str,
    feed_id: &str,
    opts: &PollOptions,
    now: DateTime<Utc>,
) -> Result<PollSummary> {
    let (server, feed) = config.feed(server_name, feed_id)?;
    let key = feed_key(server, feed);
    let window = poll_window(store, &key, now).await?;

    let request = PollRequest {
        server_name,
        server,
        feed,
        window,
    };
    let response = transport.poll(&request).await?;

    let timerange = window.describe();
    let mut block_ids = Vec::with_capacity(response.blocks.len());
    for retrieved in response.blocks {
        let block = ContentBlock {
            id: new_record_id(),
            message_id: response.message_id.clone(),
            hostname: server.hostname.clone(),
            use_hdr_src: opts.use_hdr_src,
            feed: feed.feed_name.clone(),
            block_label: retrieved.label,
            poll_time: window.end,
            timerange: timerange.clone(),
            analyst: opts.analyst.clone(),
            content: retrieved.content,
            errors: Vec::new(),
            import_failed: false,
        };
        store.save_content(&block).await?;
        block_ids.push(block.id);
    }

    store
        .save_poll(&PollRecord::new(key.clone(), now, window.end))
        .await?;

    info!(
        feed = %key,
        blocks = block_ids.len(),
        timerange = %timerange,
        "poll complete"
    );

    Ok(PollSummary {
        feed: key,
        window,
        message_id: response.message_id,
        block_ids,
    })
}
