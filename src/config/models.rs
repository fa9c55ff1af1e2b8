//! Configuration data structures for cachegate.
//!
//! Four sections, each fully defaulted so an empty file (or no file) is a
//! valid configuration: the HTTP listener, the upstream OpenAI connection,
//! the cache database and logging.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub openai: OpenAiConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Where the HTTP front end listens. Defaults to `127.0.0.1:8080`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upstream OpenAI connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Base URL the `/completions` and `/embeddings` paths are appended to.
    pub api_base_url: String,

    /// Secret key sent as a bearer token. Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,

    /// Sent as `OpenAI-Organization` when set.
    pub organization: Option<String>,

    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file, created with its parent directories on first start.
    /// Default: `~/.cachegate/cache.db`
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset.
    pub level: String,

    /// `pretty` or `json`.
    pub format: String,

    /// Mask API keys in logged upstream error bodies.
    pub sanitize_tokens: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            api_key: None,
            organization: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cachegate")
            .join("cache.db");
        Self {
            path: path.to_string_lossy().into_owned(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
            sanitize_tokens: true,
        }
    }
}
