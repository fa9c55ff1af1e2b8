// Error types for cachegate
// Author: kelexine (https://github.com/kelexine)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Upstream error: HTTP {status} {status_text}")]
    Upstream { status: u16, status_text: String },

    #[error("Cache write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupt embedding blob: {len} bytes is not a multiple of 4")]
    CorruptEmbedding { len: usize },

    #[error("OpenAI API error: {0}")]
    OpenAiApi(String),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// HTTP status used when this error reaches the front end.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) | ProxyError::UnknownModel(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::OpenAiApi(_) | ProxyError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ProxyError::InvalidRequest(_) | ProxyError::UnknownModel(_) => {
                "invalid_request_error"
            }
            ProxyError::Upstream { .. } | ProxyError::OpenAiApi(_) | ProxyError::Http(_) => {
                "upstream_error"
            }
            ProxyError::WriteFailed(_)
            | ProxyError::CorruptEmbedding { .. }
            | ProxyError::Store(_) => "cache_error",
            ProxyError::Config(_) | ProxyError::ConfigParsing(_) => "configuration_error",
            _ => "api_error",
        }
    }
}

// Convert ProxyError to HTTP responses for Axum
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "type": "error",
            "error": {
                "type": self.error_type(),
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
