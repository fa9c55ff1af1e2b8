// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{ProxyError, Result};
use config::{Config, Environment, File};
use std::path::PathBuf;

impl AppConfig {
    /// Load configuration from the default file location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file at `path`
    /// 3. Defaults (lowest)
    ///
    /// CLI overrides are applied by the caller afterwards.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name(path).required(false))
            // e.g. CACHEGATE_SERVER__PORT=9000
            .add_source(
                Environment::with_prefix("CACHEGATE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| ProxyError::Config(e.to_string()))?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| ProxyError::Config(e.to_string()))?;

        if app_config.openai.api_key.is_none() {
            app_config.openai.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        Ok(app_config)
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cachegate")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}
