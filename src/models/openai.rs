//! OpenAI wire types for the completion and embedding endpoints.
//!
//! Only the fields this proxy reads are typed; completion responses keep
//! every other field verbatim so a cached answer can be replayed exactly.

// Author: kelexine (https://github.com/kelexine)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Optional sampling parameters of a completion call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<u32>,
}

/// Body of `POST /completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    #[serde(flatten)]
    pub options: CompletionOptions,
}

/// Body of `POST /embeddings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: Vec<String>,
}

/// An outbound request to the provider.
///
/// Serialized untagged, so the fingerprinted form is exactly the body sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Request {
    Completion(CompletionRequest),
    Embedding(EmbeddingRequest),
}

impl Request {
    pub fn model(&self) -> &str {
        match self {
            Request::Completion(req) => &req.model,
            Request::Embedding(req) => &req.model,
        }
    }
}

impl From<CompletionRequest> for Request {
    fn from(req: CompletionRequest) -> Self {
        Request::Completion(req)
    }
}

impl From<EmbeddingRequest> for Request {
    fn from(req: EmbeddingRequest) -> Self {
        Request::Embedding(req)
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    /// Breakdowns and any other fields the provider adds, kept for replay.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `POST /completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Everything else (`id`, `choices`, ...), passed through untouched.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl CompletionResponse {
    pub fn total_tokens(&self) -> Option<u64> {
        self.usage.as_ref().and_then(|u| u.total_tokens)
    }
}

/// One vector of an embedding response. `index` points into the submitted `input`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
    pub index: usize,
}

/// Response of `POST /embeddings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl EmbeddingResponse {
    pub fn total_tokens(&self) -> Option<u64> {
        self.usage.as_ref().and_then(|u| u.total_tokens)
    }
}
