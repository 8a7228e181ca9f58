//! Persisted records and import results.
//!
//! [`PollRecord`] and [`ContentBlock`] are stored through the
//! [`schema`](crate::schema) engine and always surface at their latest
//! schema. [`ImportResult`] is the structured outcome shared by every import
//! entry point.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::schema::{FieldDefault, RecordSchema, Versioned};

/// Generates an identifier for a new record.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Truncates a timestamp to the millisecond precision records are stored at.
pub fn storage_time(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

/// One completed poll against one feed.
///
/// Never mutated after creation; a later poll of the same feed supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// When the poll request was made.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub runtime: DateTime<Utc>,
    /// End of the polled time window.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
    /// `hostname:feed` the data was pulled from.
    pub feed: String,
}

impl PollRecord {
    pub fn new(feed: impl Into<String>, runtime: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: new_record_id(),
            runtime: storage_time(runtime),
            end: storage_time(end),
            feed: feed.into(),
        }
    }
}

static POLL_RECORD_SCHEMA: RecordSchema = RecordSchema {
    kind: "PollRecord",
    latest: 1,
    upgrades: &[],
    required: &["_id", "runtime", "end", "feed"],
    defaults: &[],
};

impl Versioned for PollRecord {
    fn schema() -> &'static RecordSchema {
        &POLL_RECORD_SCHEMA
    }
}

/// One unit of retrieved or submitted STIX content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "_id")]
    pub id: String,
    /// ID of the TAXII message this content came from.
    #[serde(rename = "taxii_msg_id")]
    pub message_id: String,
    /// Hostname of the TAXII server.
    pub hostname: String,
    /// Prefer the STIX header's information source over the caller's
    /// source and reference when importing.
    #[serde(default)]
    pub use_hdr_src: bool,
    /// Name of the TAXII feed/collection.
    pub feed: String,
    /// STIX filename, or when the block was submitted.
    pub block_label: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub poll_time: DateTime<Utc>,
    /// Human-readable time range of the poll.
    pub timerange: String,
    /// Acting user who polled or submitted the data.
    pub analyst: String,
    pub content: String,
    /// Reasons the last import attempt failed, oldest first.
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub import_failed: bool,
}

impl ContentBlock {
    /// Records a failed import attempt against this block.
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.import_failed = true;
        self.errors.push(reason.into());
    }
}

/// v1 blocks predate header-source preference and import auditing.
fn content_block_v1_to_v2(doc: &mut Map<String, Value>) {
    doc.entry("use_hdr_src").or_insert(Value::Bool(false));
    doc.entry("import_failed").or_insert(Value::Bool(false));
}

static CONTENT_BLOCK_SCHEMA: RecordSchema = RecordSchema {
    kind: "ContentBlock",
    latest: 2,
    upgrades: &[(1, content_block_v1_to_v2)],
    required: &[
        "_id",
        "taxii_msg_id",
        "hostname",
        "feed",
        "block_label",
        "poll_time",
        "timerange",
        "analyst",
        "content",
    ],
    defaults: &[
        ("use_hdr_src", FieldDefault::False),
        ("errors", FieldDefault::EmptyList),
        ("import_failed", FieldDefault::False),
    ],
};

impl Versioned for ContentBlock {
    fn schema() -> &'static RecordSchema {
        &CONTENT_BLOCK_SCHEMA
    }
}

/// A single item that could not be imported, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub item: String,
    pub reason: String,
}

/// Outcome of an import or preview.
///
/// Successes and per-item failures are reported side by side; `reason` is
/// only populated when the operation as a whole failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub imported: Vec<String>,
    #[serde(default)]
    pub failed: Vec<FailedItem>,
}

impl ImportResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
            imported: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// True when some items imported and some did not.
    pub fn is_partial(&self) -> bool {
        !self.imported.is_empty() && !self.failed.is_empty()
    }
}
