//! Upgrade of the flat single-server configuration shape.
//!
//! Older configurations described exactly one TAXII server with top-level
//! keys and packed each feed into a `"source,feedname,certfile"` string:
//!
//! ```text
//! { hostname, certfile, keyfile, https, data_feed,
//!   certfiles: ["srcA,feed1,/path/certA", ...], namespace, ns_prefix, max_rels }
//! ```
//!
//! [`migrate_legacy`] rewrites that into a single server named `Migrated`
//! with one feed per `certfiles` entry. The flat keys are removed, so the
//! output no longer carries the [`LEGACY_MARKER`]. Running it on a nested
//! configuration would misread it; callers gate on [`is_legacy`].

use serde_json::{json, Map, Value};
use tracing::{info, warn};

/// Top-level key whose presence identifies the flat shape.
pub const LEGACY_MARKER: &str = "hostname";

/// Name given to the server built from a flat configuration.
pub const MIGRATED_SERVER_NAME: &str = "Migrated";

const LEGACY_KEYS: [&str; 6] = [
    "certfile",
    "hostname",
    "data_feed",
    "https",
    "keyfile",
    "certfiles",
];

pub fn is_legacy(config: &Map<String, Value>) -> bool {
    config.contains_key(LEGACY_MARKER)
}

fn legacy_str(config: &Map<String, Value>, key: &str) -> String {
    match config.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn legacy_feeds(config: &Map<String, Value>, keyfile: &str) -> Map<String, Value> {
    let entries: &[Value] = match config.get("certfiles") {
        Some(Value::Array(entries)) => entries.as_slice(),
        None | Some(Value::Null) => &[],
        Some(other) => {
            warn!(value = %other, "legacy certfiles is not a list; no feeds migrated");
            &[]
        }
    };

    let mut feeds = Map::new();
    for (index, entry) in entries.iter().enumerate() {
        let raw = match entry.as_str() {
            Some(raw) => raw,
            None => {
                warn!(index, value = %entry, "skipping non-string legacy certfiles entry");
                continue;
            }
        };

        let mut fields: Vec<&str> = raw.split(',').collect();
        if fields.len() < 3 {
            warn!(index, entry = raw, "legacy certfiles entry has fewer than 3 fields");
            fields.resize(3, "");
        }

        feeds.insert(
            index.to_string(),
            json!({
                "source": fields[0],
                "feedname": fields[1],
                "fcert": fields[2],
                "fkey": keyfile,
                "subID": "",
            }),
        );
    }
    feeds
}

/// Rewrites a flat configuration into the nested multi-server shape.
///
/// Keys other than the legacy ones (namespace, prefix, limits) pass through
/// untouched. Any existing `taxii_servers` is replaced.
pub fn migrate_legacy(mut config: Map<String, Value>) -> Map<String, Value> {
    let keyfile = legacy_str(&config, "keyfile");
    let feeds = legacy_feeds(&config, &keyfile);
    let feed_count = feeds.len();

    let server = json!({
        "hostname": legacy_str(&config, "hostname"),
        "lcert": legacy_str(&config, "certfile"),
        "ppath": "/poll/",
        "ipath": "/inbox/",
        "keyfile": keyfile,
        "port": "",
        "user": "",
        "pword": "",
        "feeds": feeds,
    });

    for key in LEGACY_KEYS {
        config.remove(key);
    }

    let mut servers = Map::new();
    servers.insert(MIGRATED_SERVER_NAME.to_string(), server);
    config.insert("taxii_servers".to_string(), Value::Object(servers));

    info!(feeds = feed_count, "migrated flat TAXII configuration");
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy() -> Map<String, Value> {
        json!({
            "hostname": "h",
            "certfile": "c",
            "keyfile": "k",
            "https": true,
            "data_feed": "old",
            "certfiles": ["srcA,feed1,certA"],
            "namespace": "http://example.com",
            "ns_prefix": "example",
            "max_rels": 200
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_detects_marker() {
        assert!(is_legacy(&legacy()));
        assert!(!is_legacy(&migrate_legacy(legacy())));
    }

    #[test]
    fn test_builds_migrated_server() {
        let migrated = migrate_legacy(legacy());
        let servers = migrated["taxii_servers"].as_object().unwrap();
        assert_eq!(servers.keys().collect::<Vec<_>>(), vec!["Migrated"]);

        let server = &servers["Migrated"];
        assert_eq!(server["hostname"], "h");
        assert_eq!(server["lcert"], "c");
        assert_eq!(server["keyfile"], "k");
        assert_eq!(server["ppath"], "/poll/");
        assert_eq!(server["ipath"], "/inbox/");
        assert_eq!(server["port"], "");
        assert_eq!(server["user"], "");
        assert_eq!(server["pword"], "");

        let feeds = server["feeds"].as_object().unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(
            feeds["0"],
            json!({"source": "srcA", "feedname": "feed1", "fcert": "certA", "fkey": "k", "subID": ""})
        );
    }

    #[test]
    fn test_removes_flat_keys_and_keeps_others() {
        let migrated = migrate_legacy(legacy());
        for key in LEGACY_KEYS {
            assert!(!migrated.contains_key(key), "{} should be removed", key);
        }
        assert_eq!(migrated["namespace"], "http://example.com");
        assert_eq!(migrated["max_rels"], 200);
    }

    #[test]
    fn test_keyfile_shared_by_all_feeds() {
        let mut config = legacy();
        config.insert(
            "certfiles".into(),
            json!(["a,one,/c1", "b,two,/c2", "c,three,/c3"]),
        );
        let migrated = migrate_legacy(config);
        let feeds = migrated["taxii_servers"]["Migrated"]["feeds"]
            .as_object()
            .unwrap();
        assert_eq!(feeds.len(), 3);
        assert!(feeds.values().all(|f| f["fkey"] == "k"));
        assert_eq!(feeds["2"]["source"], "c");
    }

    #[test]
    fn test_short_entry_padded() {
        let mut config = legacy();
        config.insert("certfiles".into(), json!(["srcOnly"]));
        let migrated = migrate_legacy(config);
        let feed = &migrated["taxii_servers"]["Migrated"]["feeds"]["0"];
        assert_eq!(feed["source"], "srcOnly");
        assert_eq!(feed["feedname"], "");
        assert_eq!(feed["fcert"], "");
    }

    #[test]
    fn test_missing_certfiles_yields_no_feeds() {
        let mut config = legacy();
        config.remove("certfiles");
        let migrated = migrate_legacy(config);
        let feeds = migrated["taxii_servers"]["Migrated"]["feeds"]
            .as_object()
            .unwrap();
        assert!(feeds.is_empty());
    }
}
