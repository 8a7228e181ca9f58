//! Service configuration storage.
//!
//! The configuration is one JSON document in the `service_config` table,
//! keyed by service name. A stored flat (legacy) document is upgraded the
//! first time it is loaded and written straight back in the nested shape.

use serde_json::Value;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::ConfigError;
use crate::sources::SourceRegistry;

use super::model::{ServerConfig, ServiceConfig};
use super::options::load_service_config;

pub const SERVICE_NAME: &str = "taxii_service";

pub struct ConfigRepository {
    pool: SqlitePool,
    name: String,
}

impl ConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            name: SERVICE_NAME.to_string(),
        }
    }

    /// The stored document as-is, without defaults or migration.
    pub async fn load_raw(&self) -> Result<Option<Value>, ConfigError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT config_json FROM service_config WHERE name = ?")
                .bind(&self.name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(raw.as_deref().map(serde_json::from_str::<Value>).transpose()?)
    }

    /// The effective configuration: defaults overlaid with what is stored.
    pub async fn load(&self) -> Result<ServiceConfig, ConfigError> {
        let loaded = load_service_config(self.load_raw().await?)?;
        if loaded.migrated {
            self.write(&loaded.config).await?;
            info!(service = %self.name, "stored migrated service configuration");
        }
        Ok(loaded.config)
    }

    /// Validates every scope and persists the configuration.
    ///
    /// Nothing is written when validation reports a problem.
    pub async fn save(
        &self,
        config: &ServiceConfig,
        sources: &dyn SourceRegistry,
    ) -> Result<(), ConfigError> {
        config.validate_all(sources)?;
        self.write(config).await
    }

    /// Removes a server and its feeds from the stored configuration.
    ///
    /// Removal cannot make the remaining entries invalid, so they are not
    /// re-validated; a source retired since they were saved does not block it.
    pub async fn remove_server(&self, name: &str) -> Result<ServerConfig, ConfigError> {
        let mut config = self.load().await?;
        let removed = config.remove_server(name)?;
        self.write(&config).await?;
        info!(service = %self.name, server = name, "removed TAXII server");
        Ok(removed)
    }

    async fn write(&self, config: &ServiceConfig) -> Result<(), ConfigError> {
        let json = serde_json::to_string(config)?;
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO service_config (name, config_json, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                config_json = excluded.config_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.name)
        .bind(json)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
