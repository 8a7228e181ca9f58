//! Declared service options, defaults, and configuration loading.
//!
//! [`SERVICE_OPTIONS`] is the single list of top-level settings. Defaults
//! for a fresh install and the labels used when displaying a configuration
//! both come from it.

use serde::de::Error as _;
use serde_json::{Map, Value};

use crate::error::ConfigError;

use super::legacy::{is_legacy, migrate_legacy};
use super::model::ServiceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionDefault {
    Text(&'static str),
    Integer(i64),
    EmptyMap,
}

impl OptionDefault {
    pub fn value(self) -> Value {
        match self {
            OptionDefault::Text(s) => Value::String(s.to_string()),
            OptionDefault::Integer(n) => Value::from(n),
            OptionDefault::EmptyMap => Value::Object(Map::new()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceOption {
    pub name: &'static str,
    pub label: &'static str,
    pub default: OptionDefault,
}

pub const SERVICE_OPTIONS: [ServiceOption; 4] = [
    ServiceOption {
        name: "namespace",
        label: "XML Namespace",
        default: OptionDefault::Text("http://example.com"),
    },
    ServiceOption {
        name: "ns_prefix",
        label: "XML Namespace Prefix",
        default: OptionDefault::Text("example"),
    },
    ServiceOption {
        name: "max_rels",
        label: "Maximum Related",
        default: OptionDefault::Integer(200),
    },
    ServiceOption {
        name: "taxii_servers",
        label: "TAXII Servers",
        default: OptionDefault::EmptyMap,
    },
];

/// Every declared option at its default value.
pub fn default_config() -> Map<String, Value> {
    SERVICE_OPTIONS
        .iter()
        .map(|opt| (opt.name.to_string(), opt.default.value()))
        .collect()
}

/// A configuration ready for use, and whether the flat shape was upgraded
/// on the way in.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ServiceConfig,
    pub migrated: bool,
}

/// Builds the effective configuration from what is stored, if anything.
///
/// Stored keys override the declared defaults. A stored flat configuration
/// is upgraded first; this is the only place the legacy migration runs.
pub fn load_service_config(existing: Option<Value>) -> Result<LoadedConfig, ConfigError> {
    let mut merged = default_config();
    let mut migrated = false;

    match existing {
        None | Some(Value::Null) => {}
        Some(Value::Object(mut stored)) => {
            if is_legacy(&stored) {
                stored = migrate_legacy(stored);
                migrated = true;
            }
            merged.extend(stored);
        }
        Some(other) => {
            return Err(ConfigError::Malformed(serde_json::Error::custom(format!(
                "expected a JSON object, got {}",
                crate::schema::json_type_name(&other)
            ))))
        }
    }

    let config = serde_json::from_value(Value::Object(merged))?;
    Ok(LoadedConfig { config, migrated })
}

/// Label/value pairs for showing a configuration, in declaration order.
///
/// The server map is shown as a comma-separated list of server names.
pub fn display_config(config: &ServiceConfig) -> Result<Vec<(&'static str, String)>, ConfigError> {
    let value = serde_json::to_value(config)?;
    let mut rows = Vec::with_capacity(SERVICE_OPTIONS.len());

    for opt in &SERVICE_OPTIONS {
        let rendered = match (opt.default, value.get(opt.name)) {
            (_, None) => String::new(),
            (OptionDefault::EmptyMap, Some(Value::Object(map))) => {
                map.keys().cloned().collect::<Vec<_>>().join(", ")
            }
            (_, Some(Value::String(s))) => s.clone(),
            (_, Some(other)) => other.to_string(),
        };
        rows.push((opt.label, rendered));
    }

    Ok(rows)
}
