//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;

use super::defaults::*;
use super::{global_config_path, Config};

type Builder = LibConfigBuilder<config::builder::DefaultState>;

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: Builder,
    key: &str,
    value: T,
) -> Result<Builder> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

/// Helper to override a config key from a plain environment variable
fn override_from_env(builder: Builder, var: &str, key: &str) -> Result<Builder> {
    match std::env::var(var) {
        Ok(value) => builder
            .set_override(key, value)
            .map_err(|e| Error::config(format!("Failed to set {var}: {e}"))),
        Err(_) => Ok(builder),
    }
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `GRAPHSEARCH_` and use double underscores
    /// for nested values. For example:
    /// - `GRAPHSEARCH_LLM__MODEL=gpt-4o`
    /// - `GRAPHSEARCH_SEARCH__COMMUNITY_LEVEL=3`
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        let builder = set_config_default(builder, "llm.provider", default_llm_provider())?;
        let builder = set_config_default(builder, "llm.model", default_llm_model())?;
        let builder = set_config_default(
            builder,
            "search.community_level",
            default_community_level() as i64,
        )?;
        let mut builder =
            set_config_default(builder, "storage.provider", default_storage_provider())?;

        // Add the config file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("GRAPHSEARCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Postgres variables used by existing deployments
        builder = override_from_env(builder, "POSTGRES_HOST", "storage.postgres_host")?;
        if let Ok(port) = std::env::var("POSTGRES_PORT") {
            if let Ok(port_num) = port.parse::<u16>() {
                builder = builder
                    .set_override("storage.postgres_port", port_num)
                    .map_err(|e| Error::config(format!("Failed to set POSTGRES_PORT: {e}")))?;
            }
        }
        builder = override_from_env(builder, "POSTGRES_DB", "storage.postgres_database")?;
        builder = override_from_env(builder, "POSTGRES_DATABASE", "storage.postgres_database")?;
        builder = override_from_env(builder, "POSTGRES_USER", "storage.postgres_user")?;
        builder = override_from_env(builder, "POSTGRES_PASSWORD", "storage.postgres_password")?;

        // Yandex Cloud credentials
        builder = override_from_env(builder, "YANDEX_FOLDER_ID", "llm.folder_id")?;

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from a single file
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.graphsearch/config.toml or custom --config path)
    /// 3. Environment variables (GRAPHSEARCH_*, POSTGRES_*, YANDEX_FOLDER_ID)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }
}
