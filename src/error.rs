//! Error taxonomy for the connector.
//!
//! | Error | Raised by | Recoverable |
//! |-------|-----------|-------------|
//! | [`ConfigValidationError`] | [`service::validate`](crate::service::validate) | yes, fix the input |
//! | [`DataIntegrityError`] | [`schema`](crate::schema) | no, fatal for the record |
//! | [`StoreError`] | [`store`](crate::store) backends | depends on cause |
//! | [`ConfigError`] | [`service`](crate::service) editing and persistence | yes |
//!
//! File I/O failures and per-item import failures are not errors here: the
//! import pipeline folds them into [`ImportResult`](crate::models::ImportResult).

use std::fmt;

use thiserror::Error;

/// One or more human-readable configuration rule violations.
///
/// Validators collect every violation before returning, so `messages` is
/// never empty and its order follows the order the rules are checked in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ConfigValidationError {
    pub messages: Vec<String>,
}

impl ConfigValidationError {
    /// Turns a collected message list into a result.
    pub fn check(messages: Vec<String>) -> Result<(), Self> {
        if messages.is_empty() {
            Ok(())
        } else {
            Err(Self { messages })
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages.join("; "))
    }
}

/// A stored record could not be brought to the latest schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataIntegrityError {
    #[error("{kind} record has unsupported schema version {found} (latest is {latest})")]
    UnknownVersion {
        kind: &'static str,
        found: i64,
        latest: u32,
    },

    #[error("{kind} record has no upgrade step from version {from}")]
    MissingStep { kind: &'static str, from: u32 },

    #[error("{kind} record is missing required field '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("{kind} record is malformed: {detail}")]
    Malformed { kind: &'static str, detail: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Integrity(#[from] DataIntegrityError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Validation(#[from] ConfigValidationError),

    #[error("no TAXII server named '{0}'")]
    UnknownServer(String),

    #[error("server '{server}' has no feed with id '{feed_id}'")]
    UnknownFeed { server: String, feed_id: String },

    #[error("stored service configuration is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("could not access stored service configuration: {0}")]
    Database(#[from] sqlx::Error),
}
