// Shared test doubles for the upstream providers
// Author: kelexine (https://github.com/kelexine)

#![allow(dead_code)]

use async_trait::async_trait;
use cachegate::cache::{CacheManager, Store};
use cachegate::error::Result;
use cachegate::models::{
    CompletionRequest, CompletionResponse, EmbeddingData, EmbeddingRequest, EmbeddingResponse,
    Usage,
};
use cachegate::openai::{CompletionProvider, EmbeddingProvider, UpstreamResponse};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-process stand-in for the OpenAI API.
#[derive(Default)]
pub struct FakeOpenAi {
    pub completion_calls: AtomicUsize,
    pub embedding_batches: Mutex<Vec<Vec<String>>>,
    /// When set, every call answers with this status.
    pub fail_with: Option<u16>,
    /// When false, responses carry no `usage` block.
    pub omit_usage: bool,
}

impl FakeOpenAi {
    pub fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    pub fn embedding_batches(&self) -> Vec<Vec<String>> {
        self.embedding_batches.lock().unwrap().clone()
    }

    fn usage(&self, total: u64) -> Option<Usage> {
        (!self.omit_usage).then(|| Usage {
            prompt_tokens: Some(total),
            total_tokens: Some(total),
            ..Default::default()
        })
    }
}

#[async_trait]
impl CompletionProvider for FakeOpenAi {
    async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<UpstreamResponse<CompletionResponse>> {
        let n = self.completion_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(status) = self.fail_with {
            return Ok(UpstreamResponse::failed(status, "Bad Gateway"));
        }

        let mut response: CompletionResponse = serde_json::from_value(json!({
            "id": format!("cmpl-{}", n),
            "object": "text_completion",
            "model": request.model,
            "choices": [{
                "text": " world",
                "index": 0,
                "logprobs": null,
                "finish_reason": "length"
            }],
        }))
        .unwrap();
        response.usage = self.usage(1500);
        Ok(UpstreamResponse::ok(response))
    }
}

#[async_trait]
impl EmbeddingProvider for FakeOpenAi {
    async fn create_embedding(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<UpstreamResponse<EmbeddingResponse>> {
        self.embedding_batches
            .lock()
            .unwrap()
            .push(request.input.clone());
        if let Some(status) = self.fail_with {
            return Ok(UpstreamResponse::failed(status, "Bad Gateway"));
        }

        let data = request
            .input
            .iter()
            .enumerate()
            .map(|(index, text)| EmbeddingData {
                embedding: embedding_for(text),
                index,
            })
            .rev()
            .collect();
        Ok(UpstreamResponse::ok(EmbeddingResponse {
            data,
            usage: self.usage(8),
        }))
    }
}

/// Deterministic vector the fake returns for `text`.
pub fn embedding_for(text: &str) -> Vec<f32> {
    vec![text.len() as f32, text.bytes().map(f32::from).sum(), -0.5]
}

pub fn cache_with(fake: Arc<FakeOpenAi>) -> CacheManager {
    CacheManager::new(Store::open_in_memory().unwrap(), fake.clone(), fake)
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
