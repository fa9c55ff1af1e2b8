// OpenAI upstream module
// Author: kelexine (https://github.com/kelexine)

mod client;

pub use client::OpenAiClient;

use crate::error::{ProxyError, Result};
use crate::models::{CompletionRequest, CompletionResponse, EmbeddingRequest, EmbeddingResponse};
use async_trait::async_trait;

/// Raw outcome of one upstream call.
///
/// `data` is only present when the provider answered with a success status.
#[derive(Debug, Clone)]
pub struct UpstreamResponse<T> {
    pub status: u16,
    pub status_text: String,
    pub data: Option<T>,
}

impl<T> UpstreamResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            data: Some(data),
        }
    }

    pub fn failed(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            data: None,
        }
    }

    /// Body of a 200 response, otherwise an `Upstream` error carrying the status unchanged.
    pub fn into_data(self) -> Result<T> {
        match (self.status, self.data) {
            (200, Some(data)) => Ok(data),
            (status, _) => Err(ProxyError::Upstream {
                status,
                status_text: self.status_text,
            }),
        }
    }
}

/// Something that can answer completion requests.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<UpstreamResponse<CompletionResponse>>;
}

/// Something that can embed a batch of texts.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn create_embedding(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<UpstreamResponse<EmbeddingResponse>>;
}
