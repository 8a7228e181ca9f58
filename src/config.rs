//! Application configuration.
//!
//! Read from a TOML file (default `./config/taxii.toml`):
//!
//! ```toml
//! [db]
//! path = "./data/taxii.sqlite"
//!
//! [repository]
//! sources = ["ACME", "Partner Feed"]
//!
//! [import]
//! analyst = "taxii"
//! ```
//!
//! This is the host-side configuration of the connector itself. The TAXII
//! service configuration (servers, feeds, namespaces) lives in the database;
//! see [`service`](crate::service).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::sources::StaticSources;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Names the repository knows as sources. Feed validation checks against these.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_analyst")]
    pub analyst: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            analyst: default_analyst(),
        }
    }
}

fn default_analyst() -> String {
    "taxii".to_string()
}

impl Config {
    pub fn sources(&self) -> StaticSources {
        StaticSources::new(self.repository.sources.iter().cloned())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if config.import.analyst.trim().is_empty() {
        anyhow::bail!("import.analyst must not be empty");
    }

    if let Some(blank) = config.repository.sources.iter().position(|s| s.trim().is_empty()) {
        anyhow::bail!("repository.sources[{}] must not be empty", blank);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config("[db]\npath = \"/tmp/taxii.sqlite\"\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.import.analyst, "taxii");
        assert!(config.repository.sources.is_empty());
    }

    #[test]
    fn test_sources_are_loaded() {
        let file = write_config(
            "[db]\npath = \"x.sqlite\"\n[repository]\nsources = [\"ACME\", \"Partner\"]\n",
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.repository.sources, vec!["ACME", "Partner"]);
    }

    #[test]
    fn test_blank_analyst_rejected() {
        let file = write_config("[db]\npath = \"x.sqlite\"\n[import]\nanalyst = \"  \"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("import.analyst"));
    }

    #[test]
    fn test_blank_source_rejected() {
        let file =
            write_config("[db]\npath = \"x.sqlite\"\n[repository]\nsources = [\"ACME\", \"\"]\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("repository.sources[1]"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/taxii.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
