//! Typed TAXII service configuration.
//!
//! Persisted layout:
//!
//! ```text
//! { namespace, ns_prefix, max_rels,
//!   taxii_servers: { <server name>: { hostname, ppath, ipath, keyfile?, lcert?,
//!                                     port, user, pword,
//!                                     feeds: { <feed id>: { source, feedname,
//!                                                           fcert?, fkey?, subID } } } } }
//! ```
//!
//! Optional paths are stored as absent keys; an empty string written by an
//! older configuration reads back as `None`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ConfigError, ConfigValidationError};
use crate::sources::SourceRegistry;

use super::validate::{FeedForm, ServerForm, ServiceForm};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub namespace: String,
    pub ns_prefix: String,
    #[serde(rename = "max_rels")]
    pub max_related: i64,
    #[serde(default)]
    pub taxii_servers: BTreeMap<String, ServerConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub hostname: String,
    #[serde(rename = "ppath")]
    pub poll_path: String,
    #[serde(rename = "ipath")]
    pub inbox_path: String,
    #[serde(
        rename = "keyfile",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub key_file: Option<PathBuf>,
    #[serde(
        rename = "lcert",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub local_cert: Option<PathBuf>,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub user: String,
    #[serde(rename = "pword", default)]
    pub password: String,
    #[serde(default)]
    pub feeds: BTreeMap<String, FeedConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub source: String,
    #[serde(rename = "feedname")]
    pub feed_name: String,
    #[serde(
        rename = "fcert",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub encryption_cert: Option<PathBuf>,
    #[serde(
        rename = "fkey",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub decryption_key: Option<PathBuf>,
    #[serde(rename = "subID", default)]
    pub subscription_id: String,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from))
}

/// The `PollRecord.feed` key for a feed: `hostname:feedname`.
pub fn feed_key(server: &ServerConfig, feed: &FeedConfig) -> String {
    format!("{}:{}", server.hostname, feed.feed_name)
}

impl ServiceConfig {
    pub fn server(&self, name: &str) -> Result<&ServerConfig, ConfigError> {
        self.taxii_servers
            .get(name)
            .ok_or_else(|| ConfigError::UnknownServer(name.to_string()))
    }

    /// Looks up a feed and the server that owns it.
    pub fn feed(
        &self,
        server_name: &str,
        feed_id: &str,
    ) -> Result<(&ServerConfig, &FeedConfig), ConfigError> {
        let server = self.server(server_name)?;
        let feed = server
            .feeds
            .get(feed_id)
            .ok_or_else(|| ConfigError::UnknownFeed {
                server: server_name.to_string(),
                feed_id: feed_id.to_string(),
            })?;
        Ok((server, feed))
    }

    /// Adds a server, or replaces the settings of an existing one while
    /// keeping its feeds.
    pub fn upsert_server(&mut self, form: ServerForm) -> Result<(), ConfigError> {
        form.validate()?;
        let name = form.name.trim().to_string();
        let feeds = self
            .taxii_servers
            .remove(&name)
            .map(|existing| existing.feeds)
            .unwrap_or_default();
        self.taxii_servers.insert(name, form.into_config(feeds));
        Ok(())
    }

    pub fn remove_server(&mut self, name: &str) -> Result<ServerConfig, ConfigError> {
        self.taxii_servers
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownServer(name.to_string()))
    }

    /// Adds a feed to its owning server, or replaces feed `feed_id`.
    ///
    /// New feeds get the next free integer id. Returns the id used.
    pub fn upsert_feed(
        &mut self,
        form: FeedForm,
        feed_id: Option<&str>,
        sources: &dyn SourceRegistry,
    ) -> Result<String, ConfigError> {
        form.validate(sources)?;
        let server_name = form.server_name.trim().to_string();
        let server = self
            .taxii_servers
            .get_mut(&server_name)
            .ok_or_else(|| ConfigError::UnknownServer(server_name.clone()))?;

        let id = match feed_id {
            Some(id) if server.feeds.contains_key(id) => id.to_string(),
            Some(id) => {
                return Err(ConfigError::UnknownFeed {
                    server: server_name,
                    feed_id: id.to_string(),
                })
            }
            None => next_feed_id(&server.feeds),
        };
        server.feeds.insert(id.clone(), form.into_config());
        Ok(id)
    }

    pub fn remove_feed(
        &mut self,
        server_name: &str,
        feed_id: &str,
    ) -> Result<FeedConfig, ConfigError> {
        let server = self
            .taxii_servers
            .get_mut(server_name)
            .ok_or_else(|| ConfigError::UnknownServer(server_name.to_string()))?;
        server
            .feeds
            .remove(feed_id)
            .ok_or_else(|| ConfigError::UnknownFeed {
                server: server_name.to_string(),
                feed_id: feed_id.to_string(),
            })
    }

    /// Validates every scope: the service settings, each server, each feed.
    ///
    /// Messages for a server or feed are prefixed with what they concern.
    pub fn validate_all(&self, sources: &dyn SourceRegistry) -> Result<(), ConfigValidationError> {
        let mut messages = Vec::new();

        if let Err(e) = ServiceForm::from_config(self).validate() {
            messages.extend(e.messages);
        }

        for (name, server) in &self.taxii_servers {
            if let Err(e) = ServerForm::from_config(name, server).validate() {
                messages.extend(
                    e.messages
                        .into_iter()
                        .map(|m| format!("Server '{}': {}", name, m)),
                );
            }
            for (id, feed) in &server.feeds {
                if let Err(e) = FeedForm::from_config(name, feed).validate(sources) {
                    messages.extend(
                        e.messages
                            .into_iter()
                            .map(|m| format!("Server '{}' feed {}: {}", name, id, m)),
                    );
                }
            }
        }

        ConfigValidationError::check(messages)
    }
}

fn next_feed_id(feeds: &BTreeMap<String, FeedConfig>) -> String {
    feeds
        .keys()
        .filter_map(|k| k.parse::<u64>().ok())
        .max()
        .map_or(0, |m| m + 1)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StaticSources;
    use serde_json::json;

    fn base() -> ServiceConfig {
        ServiceConfig {
            namespace: "http://example.com".into(),
            ns_prefix: "example".into(),
            max_related: 200,
            taxii_servers: BTreeMap::new(),
        }
    }

    fn server_form(name: &str) -> ServerForm {
        ServerForm {
            name: name.into(),
            hostname: "taxii.example.org".into(),
            poll_path: "/poll/".into(),
            inbox_path: "/inbox/".into(),
            ..ServerForm::default()
        }
    }

    fn feed_form(server: &str, feed: &str) -> FeedForm {
        FeedForm {
            server_name: server.into(),
            feed_name: feed.into(),
            source: "ACME".into(),
            ..FeedForm::default()
        }
    }

    #[test]
    fn test_blank_paths_read_as_none() {
        let server: ServerConfig = serde_json::from_value(json!({
            "hostname": "h", "ppath": "/poll/", "ipath": "/inbox/",
            "keyfile": "", "lcert": "  ", "port": "", "user": "", "pword": "", "feeds": {}
        }))
        .unwrap();
        assert_eq!(server.key_file, None);
        assert_eq!(server.local_cert, None);
        let out = serde_json::to_value(&server).unwrap();
        assert!(out.get("keyfile").is_none());
    }

    #[test]
    fn test_feed_key() {
        let server = ServerConfig {
            hostname: "taxii.example.org".into(),
            ..ServerConfig::default()
        };
        let feed = FeedConfig {
            feed_name: "alpha".into(),
            ..FeedConfig::default()
        };
        assert_eq!(feed_key(&server, &feed), "taxii.example.org:alpha");
    }

    #[test]
    fn test_upsert_server_keeps_feeds() {
        let sources = StaticSources::new(["ACME"]);
        let mut config = base();
        config.upsert_server(server_form("Acme 01")).unwrap();
        config
            .upsert_feed(feed_form("Acme 01", "alpha"), None, &sources)
            .unwrap();

        let mut edited = server_form("Acme 01");
        edited.hostname = "new.example.org".into();
        config.upsert_server(edited).unwrap();

        let server = config.server("Acme 01").unwrap();
        assert_eq!(server.hostname, "new.example.org");
        assert_eq!(server.feeds.len(), 1);
    }

    #[test]
    fn test_upsert_server_rejects_invalid() {
        let mut config = base();
        let err = config.upsert_server(server_form("Acme!01")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(config.taxii_servers.is_empty());
    }

    #[test]
    fn test_feed_ids_increment() {
        let sources = StaticSources::new(["ACME"]);
        let mut config = base();
        config.upsert_server(server_form("srv")).unwrap();
        let a = config.upsert_feed(feed_form("srv", "a"), None, &sources).unwrap();
        let b = config.upsert_feed(feed_form("srv", "b"), None, &sources).unwrap();
        assert_eq!((a.as_str(), b.as_str()), ("0", "1"));

        config.remove_feed("srv", "0").unwrap();
        let c = config.upsert_feed(feed_form("srv", "c"), None, &sources).unwrap();
        assert_eq!(c, "2");
    }

    #[test]
    fn test_upsert_feed_unknown_server() {
        let sources = StaticSources::new(["ACME"]);
        let mut config = base();
        let err = config
            .upsert_feed(feed_form("ghost", "a"), None, &sources)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownServer(name) if name == "ghost"));
    }

    #[test]
    fn test_edit_missing_feed_id() {
        let sources = StaticSources::new(["ACME"]);
        let mut config = base();
        config.upsert_server(server_form("srv")).unwrap();
        let err = config
            .upsert_feed(feed_form("srv", "a"), Some("7"), &sources)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFeed { .. }));
    }

    #[test]
    fn test_validate_all_collects_every_scope() {
        let mut config = base();
        config.max_related = 0;
        config.taxii_servers.insert(
            "Bad!".into(),
            ServerConfig {
                hostname: "h".into(),
                poll_path: "/poll/".into(),
                inbox_path: "/inbox/".into(),
                feeds: BTreeMap::from([(
                    "0".to_string(),
                    FeedConfig {
                        source: "Nobody".into(),
                        feed_name: "f".into(),
                        ..FeedConfig::default()
                    },
                )]),
                ..ServerConfig::default()
            },
        );

        let err = config.validate_all(&StaticSources::new(["ACME"])).unwrap_err();
        assert!(err.contains("Maximum Related"));
        assert!(err.contains("Server 'Bad!': Server name can only contain"));
        assert!(err.contains("Server 'Bad!' feed 0: Provided server name is invalid"));
        assert!(err.contains("Server 'Bad!' feed 0: Provided repository source is invalid"));
    }
}
