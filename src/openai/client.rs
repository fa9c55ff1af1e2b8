// OpenAI HTTP client
// Author: kelexine (https://github.com/kelexine)

use super::{CompletionProvider, EmbeddingProvider, UpstreamResponse};
use crate::config::OpenAiConfig;
use crate::error::{ProxyError, Result};
use crate::metrics;
use crate::models::{CompletionRequest, CompletionResponse, EmbeddingRequest, EmbeddingResponse};
use crate::utils::logging::sanitize;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Client for the OpenAI REST API.
///
/// Makes exactly one HTTP request per call. Failures are handed back to the
/// caller as-is; there is no retry layer.
#[derive(Clone)]
pub struct OpenAiClient {
    http_client: Client,
    config: OpenAiConfig,
    sanitize_errors: bool,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .use_rustls_tls()
            .build()
            .map_err(|e| ProxyError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        if config.api_key.is_none() {
            debug!("No OpenAI API key configured, sending unauthenticated requests");
        }

        Ok(Self {
            http_client,
            config: config.clone(),
            sanitize_errors: true,
        })
    }

    /// Whether upstream error bodies are scrubbed of secrets before logging.
    pub fn with_sanitized_errors(mut self, enabled: bool) -> Self {
        self.sanitize_errors = enabled;
        self
    }

    /// Get the API base_url
    pub fn base_url(&self) -> &str {
        &self.config.api_base_url
    }

    async fn post<B, T>(
        &self,
        kind: &str,
        path: &str,
        model: &str,
        body: &B,
    ) -> Result<UpstreamResponse<T>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), path);
        debug!("Calling {} for model: {}", url, model);

        let mut request = self.http_client.post(&url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(org) = &self.config.organization {
            request = request.header("OpenAI-Organization", org);
        }

        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| ProxyError::OpenAiApi(format!("HTTP error: {}", e)))?;

        let status = response.status();
        metrics::record_upstream_call(kind, model, status.as_u16(), start.elapsed().as_secs_f64());

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let error_text = if self.sanitize_errors {
                sanitize(&error_text)
            } else {
                error_text
            };
            error!("OpenAI API error: HTTP {} - Response body: {}", status, error_text);
            return Ok(UpstreamResponse::failed(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status"),
            ));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| ProxyError::OpenAiApi(format!("Failed to read response body: {}", e)))?;

        let data: T = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse OpenAI response: {}", e);
            ProxyError::OpenAiApi(format!("Response parsing error: {}", e))
        })?;

        Ok(UpstreamResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("OK").to_string(),
            data: Some(data),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<UpstreamResponse<CompletionResponse>> {
        self.post("completion", "completions", &request.model, request).await
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn create_embedding(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<UpstreamResponse<EmbeddingResponse>> {
        self.post("embedding", "embeddings", &request.model, request).await
    }
}
