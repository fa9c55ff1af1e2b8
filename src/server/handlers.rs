// HTTP request handlers
// Author: kelexine (https://github.com/kelexine)

use super::routes::AppState;
use crate::cache::{CacheStats, EmbedOutcome, EmbeddingResult};
use crate::error::{ProxyError, Result};
use crate::metrics;
use crate::models::{
    is_completion_model, is_embedding_model, CompletionOptions, CompletionRequest,
    CompletionResponse,
};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HashMap<String, HealthCheck>,
    pub cache: CacheStats,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: String,
}

/// Number of cache writes or reads that failed while serving an embedding request.
pub const CACHE_ERRORS_HEADER: HeaderName = HeaderName::from_static("x-cache-errors");

pub async fn ping_handler() -> &'static str {
    "pong"
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut checks = HashMap::new();
    let mut overall_status = HealthStatus::Healthy;

    let store_check = match state.cache.store().ping().await {
        Ok(()) => HealthCheck {
            status: "ok".to_string(),
            message: format!("Cache store: {}", state.config.store.path),
        },
        Err(e) => {
            overall_status = HealthStatus::Unhealthy;
            HealthCheck {
                status: "error".to_string(),
                message: e.to_string(),
            }
        }
    };
    checks.insert("store".to_string(), store_check);

    checks.insert(
        "configuration".to_string(),
        HealthCheck {
            status: "ok".to_string(),
            message: format!("API base: {}", state.config.openai.api_base_url),
        },
    );

    Json(HealthResponse {
        status: overall_status,
        checks,
        cache: state.cache.get_stats().await,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

/// Query string of `GET /complete`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteQuery {
    pub model: String,
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub logprobs: Option<u32>,
}

/// Query string of `GET /embed`. `texts` is comma separated.
#[derive(Debug, Deserialize)]
pub struct EmbedQuery {
    pub model: String,
    pub texts: String,
}

/// `input` of `POST /v1/embeddings`, a single string or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingsBody {
    pub model: String,
    pub input: EmbeddingInput,
}

pub async fn complete_handler(
    State(state): State<AppState>,
    Query(query): Query<CompleteQuery>,
) -> Result<Json<CompletionResponse>> {
    let options = CompletionOptions {
        max_tokens: query.max_tokens,
        temperature: query.temperature,
        logprobs: query.logprobs,
    };
    complete(&state, &query.model, &query.prompt, options).await.map(Json)
}

pub async fn completions_handler(
    State(state): State<AppState>,
    Json(req): Json<CompletionRequest>,
) -> Result<Json<CompletionResponse>> {
    complete(&state, &req.model, &req.prompt, req.options).await.map(Json)
}

pub async fn embed_handler(
    State(state): State<AppState>,
    Query(query): Query<EmbedQuery>,
) -> Result<(HeaderMap, Json<Vec<EmbeddingResult>>)> {
    let texts: Vec<String> = query.texts.split(',').map(str::to_string).collect();
    let outcome = embed(&state, &query.model, &texts).await?;
    Ok((cache_error_headers(&outcome), Json(outcome.results)))
}

pub async fn embeddings_handler(
    State(state): State<AppState>,
    Json(body): Json<EmbeddingsBody>,
) -> Result<(HeaderMap, Json<Value>)> {
    let texts = match body.input {
        EmbeddingInput::Single(text) => vec![text],
        EmbeddingInput::Batch(texts) => texts,
    };
    let outcome = embed(&state, &body.model, &texts).await?;
    let headers = cache_error_headers(&outcome);

    let data: Vec<Value> = outcome
        .results
        .into_iter()
        .enumerate()
        .map(|(index, result)| {
            json!({
                "object": "embedding",
                "embedding": result.embedding,
                "index": index,
            })
        })
        .collect();

    Ok((
        headers,
        Json(json!({
            "object": "list",
            "model": body.model,
            "data": data,
        })),
    ))
}

/// Tell the caller when some vectors were served but could not be cached.
fn cache_error_headers(outcome: &EmbedOutcome) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if !outcome.cache_errors.is_empty() {
        headers.insert(
            CACHE_ERRORS_HEADER,
            HeaderValue::from(outcome.cache_errors.len()),
        );
    }
    headers
}

async fn complete(
    state: &AppState,
    model: &str,
    prompt: &str,
    options: CompletionOptions,
) -> Result<CompletionResponse> {
    validate_completion(model, prompt, &options)?;
    info!("Completion request: model={}, prompt_chars={}", model, prompt.len());
    state.cache.complete_with_cache(model, prompt, options).await
}

async fn embed(state: &AppState, model: &str, texts: &[String]) -> Result<EmbedOutcome> {
    validate_embedding(model, texts)?;
    info!("Embedding request: model={}, texts={}", model, texts.len());

    let outcome = state.cache.embed_with_cache(model, texts).await?;
    if !outcome.cache_errors.is_empty() {
        warn!(
            "Embedding request served with {} cache error(s)",
            outcome.cache_errors.len()
        );
    }
    Ok(outcome)
}

fn validate_completion(model: &str, prompt: &str, options: &CompletionOptions) -> Result<()> {
    if !is_completion_model(model) {
        return Err(ProxyError::InvalidRequest(format!(
            "Unsupported completion model: {}",
            model
        )));
    }
    if prompt.is_empty() {
        return Err(ProxyError::InvalidRequest("prompt must not be empty".to_string()));
    }
    if options.max_tokens == Some(0) {
        return Err(ProxyError::InvalidRequest("maxTokens must be positive".to_string()));
    }
    if let Some(t) = options.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(ProxyError::InvalidRequest(
                "temperature must be between 0 and 2".to_string(),
            ));
        }
    }
    if let Some(n) = options.logprobs {
        if !(1..=5).contains(&n) {
            return Err(ProxyError::InvalidRequest(
                "logprobs must be between 1 and 5".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_embedding(model: &str, texts: &[String]) -> Result<()> {
    if !is_embedding_model(model) {
        return Err(ProxyError::InvalidRequest(format!(
            "Unsupported embedding model: {}",
            model
        )));
    }
    if texts.is_empty() || texts.iter().any(String::is_empty) {
        return Err(ProxyError::InvalidRequest(
            "texts must be a non-empty list of non-empty strings".to_string(),
        ));
    }
    Ok(())
}
