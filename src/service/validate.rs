//! Validation of the three configuration scopes.
//!
//! Each scope has a form type holding the raw submitted values. `validate`
//! checks every rule and returns all violations together, in rule order.
//! Values are trimmed before they are checked.
//!
//! Path rules check the filesystem the validator runs on; source rules ask
//! the [`SourceRegistry`]. Nothing here mutates state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigValidationError;
use crate::sources::SourceRegistry;

use super::model::{FeedConfig, ServerConfig, ServiceConfig};

/// Inclusive upper bound for the related-object limit.
pub const MAX_RELATED_LIMIT: i64 = 5000;

/// Letters, digits, underscore, and spaces.
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_ ]+$").expect("server name pattern is valid"));

pub fn is_valid_server_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

fn optional_path(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn path_text(path: &Option<PathBuf>) -> String {
    path.as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

fn is_file(path: &str) -> bool {
    Path::new(path).is_file()
}

/// Service-wide settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceForm {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub ns_prefix: String,
    #[serde(default)]
    pub max_rels: Option<i64>,
}

impl ServiceForm {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            ns_prefix: config.ns_prefix.clone(),
            max_rels: Some(config.max_related),
        }
    }

    /// A missing or zero limit is rejected along with anything outside
    /// `0..=5000`.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let mut errors = Vec::new();

        if self.namespace.trim().is_empty() {
            errors.push("You must specify an XML Namespace.".to_string());
        }
        if self.ns_prefix.trim().is_empty() {
            errors.push("You must specify an XML Namespace Prefix.".to_string());
        }
        match self.max_rels {
            Some(n) if n != 0 && (0..=MAX_RELATED_LIMIT).contains(&n) => {}
            _ => errors.push(format!(
                "Maximum Related must be in the range 0-{}.",
                MAX_RELATED_LIMIT
            )),
        }

        ConfigValidationError::check(errors)
    }
}

/// Settings for one TAXII server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerForm {
    #[serde(default, rename = "servername")]
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default, rename = "ppath")]
    pub poll_path: String,
    #[serde(default, rename = "ipath")]
    pub inbox_path: String,
    #[serde(default, rename = "keyfile")]
    pub key_file: String,
    #[serde(default, rename = "lcert")]
    pub local_cert: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, rename = "pword")]
    pub password: String,
}

impl ServerForm {
    pub fn from_config(name: &str, server: &ServerConfig) -> Self {
        Self {
            name: name.to_string(),
            hostname: server.hostname.clone(),
            poll_path: server.poll_path.clone(),
            inbox_path: server.inbox_path.clone(),
            key_file: path_text(&server.key_file),
            local_cert: path_text(&server.local_cert),
            port: server.port.clone(),
            user: server.user.clone(),
            password: server.password.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let name = self.name.trim();
        let key_file = self.key_file.trim();
        let local_cert = self.local_cert.trim();
        let mut errors = Vec::new();

        if name.is_empty() {
            errors.push("You must specify a name for the TAXII Server.".to_string());
        }
        if !is_valid_server_name(name) {
            errors.push(
                "Server name can only contain letters, numbers, underscores, and spaces."
                    .to_string(),
            );
        }
        if self.hostname.trim().is_empty() {
            errors.push("You must specify a TAXII Server hostname.".to_string());
        }
        if self.poll_path.trim().is_empty() {
            errors.push("You must specify a TAXII Server Poll Path.".to_string());
        }
        if self.inbox_path.trim().is_empty() {
            errors.push("You must specify a TAXII Server Inbox Path.".to_string());
        }
        if !key_file.is_empty() && local_cert.is_empty() {
            errors.push("If you provide a keyfile, you must also provide a certificate.".to_string());
        }
        if key_file.is_empty() && !local_cert.is_empty() {
            errors.push("If you provide a certificate, you must also provide a keyfile.".to_string());
        }
        if !key_file.is_empty() && !is_file(key_file) {
            errors.push("Keyfile does not exist at given location.".to_string());
        }
        if !local_cert.is_empty() && !is_file(local_cert) {
            errors.push("Local certificate file does not exist at given location.".to_string());
        }

        ConfigValidationError::check(errors)
    }

    pub fn into_config(self, feeds: BTreeMap<String, FeedConfig>) -> ServerConfig {
        ServerConfig {
            hostname: self.hostname.trim().to_string(),
            poll_path: self.poll_path.trim().to_string(),
            inbox_path: self.inbox_path.trim().to_string(),
            key_file: optional_path(&self.key_file),
            local_cert: optional_path(&self.local_cert),
            port: self.port.trim().to_string(),
            user: self.user.trim().to_string(),
            password: self.password,
            feeds,
        }
    }
}

/// Settings for one feed of a TAXII server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedForm {
    #[serde(default, rename = "srv_name")]
    pub server_name: String,
    #[serde(default, rename = "feedname")]
    pub feed_name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, rename = "subID")]
    pub subscription_id: String,
    #[serde(default, rename = "fcert")]
    pub encryption_cert: String,
    #[serde(default, rename = "fkey")]
    pub decryption_key: String,
}

impl FeedForm {
    pub fn from_config(server_name: &str, feed: &FeedConfig) -> Self {
        Self {
            server_name: server_name.to_string(),
            feed_name: feed.feed_name.clone(),
            source: feed.source.clone(),
            subscription_id: feed.subscription_id.clone(),
            encryption_cert: path_text(&feed.encryption_cert),
            decryption_key: path_text(&feed.decryption_key),
        }
    }

    pub fn validate(&self, sources: &dyn SourceRegistry) -> Result<(), ConfigValidationError> {
        let server_name = self.server_name.trim();
        let source = self.source.trim();
        let encryption_cert = self.encryption_cert.trim();
        let decryption_key = self.decryption_key.trim();
        let mut errors = Vec::new();

        if server_name.is_empty() {
            errors.push("No server name to which to relate this feed".to_string());
        }
        if !is_valid_server_name(server_name) {
            errors.push("Provided server name is invalid".to_string());
        }
        if self.feed_name.trim().is_empty() {
            errors.push("You must specify a Feed Name".to_string());
        }
        if source.is_empty() {
            errors.push("You must specify a repository source".to_string());
        } else if !sources.source_exists(source) {
            errors.push("Provided repository source is invalid".to_string());
        }
        if !encryption_cert.is_empty() && !is_file(encryption_cert) {
            errors.push("Encryption certificate does not exist at given location".to_string());
        }
        if !decryption_key.is_empty() && !is_file(decryption_key) {
            errors.push("Decryption key does not exist at given location".to_string());
        }

        ConfigValidationError::check(errors)
    }

    pub fn into_config(self) -> FeedConfig {
        FeedConfig {
            source: self.source.trim().to_string(),
            feed_name: self.feed_name.trim().to_string(),
            encryption_cert: optional_path(&self.encryption_cert),
            decryption_key: optional_path(&self.decryption_key),
            subscription_id: self.subscription_id.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StaticSources;
    use tempfile::NamedTempFile;

    fn service(max_rels: Option<i64>) -> ServiceForm {
        ServiceForm {
            namespace: "http://example.com".into(),
            ns_prefix: "example".into(),
            max_rels,
        }
    }

    fn server(name: &str) -> ServerForm {
        ServerForm {
            name: name.into(),
            hostname: "taxii.example.org".into(),
            poll_path: "/poll/".into(),
            inbox_path: "/inbox/".into(),
            ..ServerForm::default()
        }
    }

    fn feed() -> FeedForm {
        FeedForm {
            server_name: "Acme 01".into(),
            feed_name: "alpha".into(),
            source: "ACME".into(),
            ..FeedForm::default()
        }
    }

    #[test]
    fn test_max_rels_upper_bound_inclusive() {
        assert!(service(Some(5000)).validate().is_ok());
        assert!(service(Some(1)).validate().is_ok());
    }

    #[test]
    fn test_max_rels_out_of_range() {
        for bad in [Some(5001), Some(-1), Some(0), None] {
            let err = service(bad).validate().unwrap_err();
            assert_eq!(
                err.messages,
                vec!["Maximum Related must be in the range 0-5000.".to_string()],
                "max_rels {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_blank_namespace_and_prefix() {
        let form = ServiceForm {
            namespace: "  ".into(),
            ns_prefix: String::new(),
            max_rels: Some(10),
        };
        let err = form.validate().unwrap_err();
        assert_eq!(
            err.messages,
            vec![
                "You must specify an XML Namespace.".to_string(),
                "You must specify an XML Namespace Prefix.".to_string(),
            ]
        );
    }

    #[test]
    fn test_server_name_characters() {
        assert!(server("Acme 01").validate().is_ok());
        assert!(server("acme_feed").validate().is_ok());
        let err = server("Acme!01").validate().unwrap_err();
        assert!(err.contains("Server name can only contain"));
    }

    #[test]
    fn test_blank_server_name_reports_both_rules() {
        let err = server("").validate().unwrap_err();
        assert_eq!(err.messages.len(), 2);
        assert!(err.contains("You must specify a name"));
        assert!(err.contains("can only contain"));
    }

    #[test]
    fn test_required_server_fields() {
        let err = ServerForm {
            name: "srv".into(),
            ..ServerForm::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(
            err.messages,
            vec![
                "You must specify a TAXII Server hostname.".to_string(),
                "You must specify a TAXII Server Poll Path.".to_string(),
                "You must specify a TAXII Server Inbox Path.".to_string(),
            ]
        );
    }

    #[test]
    fn test_keyfile_without_certificate() {
        let key = NamedTempFile::new().unwrap();
        let mut form = server("srv");
        form.key_file = key.path().display().to_string();
        let err = form.validate().unwrap_err();
        assert_eq!(
            err.messages,
            vec!["If you provide a keyfile, you must also provide a certificate.".to_string()]
        );
    }

    #[test]
    fn test_certificate_without_keyfile() {
        let cert = NamedTempFile::new().unwrap();
        let mut form = server("srv");
        form.local_cert = cert.path().display().to_string();
        let err = form.validate().unwrap_err();
        assert!(err.contains("If you provide a certificate, you must also provide a keyfile."));
    }

    #[test]
    fn test_missing_key_and_cert_files_distinguished() {
        let mut form = server("srv");
        form.key_file = "/nonexistent/client.key".into();
        form.local_cert = "/nonexistent/client.crt".into();
        let err = form.validate().unwrap_err();
        assert_eq!(
            err.messages,
            vec![
                "Keyfile does not exist at given location.".to_string(),
                "Local certificate file does not exist at given location.".to_string(),
            ]
        );
    }

    #[test]
    fn test_existing_key_and_cert_pass() {
        let key = NamedTempFile::new().unwrap();
        let cert = NamedTempFile::new().unwrap();
        let mut form = server("srv");
        form.key_file = key.path().display().to_string();
        form.local_cert = cert.path().display().to_string();
        assert!(form.validate().is_ok());
        let config = form.into_config(Default::default());
        assert_eq!(config.key_file.as_deref(), Some(key.path()));
    }

    #[test]
    fn test_feed_valid() {
        let sources = StaticSources::new(["ACME"]);
        assert!(feed().validate(&sources).is_ok());
    }

    #[test]
    fn test_feed_unknown_source() {
        let sources = StaticSources::new(["Other"]);
        let err = feed().validate(&sources).unwrap_err();
        assert_eq!(err.messages, vec!["Provided repository source is invalid".to_string()]);
    }

    #[test]
    fn test_feed_blank_source_skips_lookup() {
        let lookup = |_: &str| -> bool { panic!("lookup must not run for a blank source") };
        let mut form = feed();
        form.source = " ".into();
        let err = form.validate(&lookup).unwrap_err();
        assert_eq!(err.messages, vec!["You must specify a repository source".to_string()]);
    }

    #[test]
    fn test_feed_bad_server_name_and_files() {
        let sources = StaticSources::new(["ACME"]);
        let mut form = feed();
        form.server_name = "a/b".into();
        form.feed_name = String::new();
        form.encryption_cert = "/nonexistent/enc.pem".into();
        form.decryption_key = "/nonexistent/dec.key".into();
        let err = form.validate(&sources).unwrap_err();
        assert_eq!(
            err.messages,
            vec![
                "Provided server name is invalid".to_string(),
                "You must specify a Feed Name".to_string(),
                "Encryption certificate does not exist at given location".to_string(),
                "Decryption key does not exist at given location".to_string(),
            ]
        );
    }
}
