//! Data models for the OpenAI APIs proxied by cachegate.
//!
//! - `catalog`: which model identifiers are served, and by which endpoint
//! - `openai`: request/response bodies of the completion and embedding endpoints
//! - `pricing`: the per-model rate table and cost function

// Author: kelexine (https://github.com/kelexine)

pub mod catalog;
pub mod openai;
pub mod pricing;

pub use catalog::{is_completion_model, is_embedding_model, model_family, ModelFamily};
pub use openai::{
    CompletionOptions, CompletionRequest, CompletionResponse, EmbeddingData, EmbeddingRequest,
    EmbeddingResponse, Request, Usage,
};
pub use pricing::cost;
