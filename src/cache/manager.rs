// Cache manager - request deduplication in front of the OpenAI API
// Author: kelexine (https://github.com/kelexine)

use crate::cache::codec;
use crate::cache::fingerprint::{fingerprint_request, fingerprint_text};
use crate::cache::models::{CacheStats, EmbedOutcome, EmbeddingResult, RequestKind};
use crate::cache::store::Store;
use crate::error::{ProxyError, Result};
use crate::metrics;
use crate::models::pricing;
use crate::models::{
    CompletionOptions, CompletionRequest, CompletionResponse, EmbeddingRequest, Request,
};
use crate::openai::{CompletionProvider, EmbeddingProvider};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// Serves completion and embedding requests from the store when possible
/// and forwards misses to the upstream providers.
///
/// Holds no per-call state. Two concurrent calls for the same payload may
/// both miss and both go upstream; the store keeps both rows and later
/// lookups return the newest.
pub struct CacheManager {
    store: Store,
    completions: Arc<dyn CompletionProvider>,
    embeddings: Arc<dyn EmbeddingProvider>,
    stats: Arc<RwLock<CacheStats>>,
}

impl CacheManager {
    /// Create a new cache manager
    pub fn new(
        store: Store,
        completions: Arc<dyn CompletionProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            completions,
            embeddings,
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Complete `prompt` on `model`, answering from the cache when an
    /// identical request was served before.
    ///
    /// A hit makes no upstream call and writes nothing. A miss that succeeds
    /// upstream is cached and, if it reports usage, logged to the ledger.
    /// Cache write failures are reported but never hide the upstream answer.
    pub async fn complete_with_cache(
        &self,
        model: &str,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<CompletionResponse> {
        pricing::rate_per_1k(model)?;

        let request = CompletionRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            options,
        };
        let payload = Request::from(request.clone());
        let fingerprint = fingerprint_request(&payload)?;

        if let Some(entry) = self.store.find_latest_request(&fingerprint).await? {
            debug!("Completion cache hit: {}", &fingerprint[..16]);
            self.stats.write().await.hits += 1;
            metrics::record_cache_hit(RequestKind::Completion.as_str());
            return Ok(serde_json::from_str(&entry.response_json)?);
        }

        debug!("Completion cache miss: {}", &fingerprint[..16]);
        self.stats.write().await.misses += 1;
        metrics::record_cache_miss(RequestKind::Completion.as_str());

        let response = self
            .completions
            .create_completion(&request)
            .await?
            .into_data()?;

        match self.insert_completion(&fingerprint, &payload, &response).await {
            Ok(()) => self.record_insert(RequestKind::Completion).await,
            Err(e) => self.report_failure(RequestKind::Completion, &e).await,
        }

        if let Some(tokens) = response.total_tokens() {
            if let Err(e) = self.log_usage(RequestKind::Completion, model, tokens).await {
                self.report_failure(RequestKind::Completion, &e).await;
            }
        }

        Ok(response)
    }

    /// Embed `texts` with `model`, fetching only the texts not already cached.
    ///
    /// Identical texts within a batch are sent upstream once. The returned
    /// results follow the order of `texts`, duplicates included.
    pub async fn embed_with_cache(&self, model: &str, texts: &[String]) -> Result<EmbedOutcome> {
        pricing::rate_per_1k(model)?;

        let mut outcome = EmbedOutcome::default();
        let mut seen = HashSet::new();
        let distinct: Vec<&str> = texts
            .iter()
            .map(String::as_str)
            .filter(|text| seen.insert(*text))
            .collect();

        let probes = join_all(distinct.iter().map(|&text| async move {
            let found = self
                .store
                .find_latest_embedding(&fingerprint_text(text), model)
                .await;
            (text, found)
        }))
        .await;

        let mut resolved: HashMap<&str, (Vec<f32>, bool)> =
            HashMap::with_capacity(distinct.len());
        let mut uncached: Vec<&str> = Vec::new();
        {
            let mut stats = self.stats.write().await;
            for (text, found) in probes {
                match found {
                    Ok(Some(entry)) => {
                        stats.hits += 1;
                        metrics::record_cache_hit(RequestKind::Embedding.as_str());
                        resolved.insert(text, (entry.embedding, true));
                    }
                    Ok(None) => {
                        stats.misses += 1;
                        metrics::record_cache_miss(RequestKind::Embedding.as_str());
                        uncached.push(text);
                    }
                    Err(e @ ProxyError::CorruptEmbedding { .. }) => {
                        // Refetch; the new row supersedes the corrupt one.
                        warn!("Ignoring corrupt cached embedding for model {}: {}", model, e);
                        stats.misses += 1;
                        stats.corrupt_reads += 1;
                        metrics::record_corrupt_read(RequestKind::Embedding.as_str());
                        uncached.push(text);
                        outcome.cache_errors.push(e);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        debug!(
            "Embedding batch: {} texts, {} distinct, {} cached, {} to fetch",
            texts.len(),
            distinct.len(),
            resolved.len(),
            uncached.len()
        );

        if !uncached.is_empty() {
            let request = EmbeddingRequest {
                model: model.to_string(),
                input: uncached.iter().map(|text| text.to_string()).collect(),
            };
            let response = self
                .embeddings
                .create_embedding(&request)
                .await?
                .into_data()?;

            if let Some(tokens) = response.total_tokens() {
                if let Err(e) = self.log_usage(RequestKind::Embedding, model, tokens).await {
                    self.report_failure(RequestKind::Embedding, &e).await;
                    outcome.cache_errors.push(e);
                }
            }

            // Pair by the provider's index, not by position in `data`.
            let mut fetched: HashMap<&str, Vec<f32>> = HashMap::with_capacity(uncached.len());
            for item in response.data {
                let text = uncached.get(item.index).copied().ok_or_else(|| {
                    ProxyError::OpenAiApi(format!(
                        "embedding index {} outside submitted batch of {}",
                        item.index,
                        uncached.len()
                    ))
                })?;
                fetched.insert(text, item.embedding);
            }
            if let Some(missing) = uncached.iter().find(|text| !fetched.contains_key(*text)) {
                return Err(ProxyError::OpenAiApi(format!(
                    "no embedding returned for input {:?}",
                    missing
                )));
            }

            let writes = join_all(fetched.iter().map(|(&text, embedding)| async move {
                self.store
                    .insert_embedding(
                        &fingerprint_text(text),
                        model,
                        text,
                        codec::encode(embedding),
                    )
                    .await
            }))
            .await;

            for write in writes {
                match write {
                    Ok(()) => self.record_insert(RequestKind::Embedding).await,
                    Err(e) => {
                        self.report_failure(RequestKind::Embedding, &e).await;
                        outcome.cache_errors.push(e);
                    }
                }
            }

            resolved.extend(
                fetched
                    .into_iter()
                    .map(|(text, embedding)| (text, (embedding, false))),
            );
        }

        outcome.results = texts
            .iter()
            .map(|text| {
                resolved
                    .get(text.as_str())
                    .map(|(embedding, cached)| EmbeddingResult {
                        text: text.clone(),
                        embedding: embedding.clone(),
                        cached: *cached,
                    })
                    .ok_or_else(|| {
                        ProxyError::Internal(format!("unresolved embedding input {:?}", text))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(outcome)
    }

    /// Get cache statistics
    pub async fn get_stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    async fn insert_completion(
        &self,
        fingerprint: &str,
        payload: &Request,
        response: &CompletionResponse,
    ) -> Result<()> {
        let model = payload.model();
        let tokens = response.total_tokens();
        let cost = pricing::cost(model, tokens.unwrap_or(0))?;
        let request_json = serde_json::to_string(payload)?;
        let response_json = serde_json::to_string(response)?;

        self.store
            .insert_request(
                RequestKind::Completion,
                fingerprint,
                &request_json,
                &response_json,
                tokens,
                model,
                cost,
            )
            .await
    }

    async fn log_usage(&self, kind: RequestKind, model: &str, tokens: u64) -> Result<()> {
        let cost = pricing::cost(model, tokens)?;
        self.store.append_log(kind, model, tokens, cost).await?;
        metrics::record_usage(kind.as_str(), model, tokens, cost);
        Ok(())
    }

    async fn record_insert(&self, kind: RequestKind) {
        self.stats.write().await.inserts += 1;
        metrics::record_cache_insert(kind.as_str());
    }

    /// Failed writes mean avoidable future misses; make them visible to operators.
    async fn report_failure(&self, kind: RequestKind, err: &ProxyError) {
        error!("{} cache write failed: {}", kind, err);
        self.stats.write().await.write_failures += 1;
        metrics::record_write_failure(kind.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletionResponse, EmbeddingData, EmbeddingResponse, Usage};
    use crate::openai::UpstreamResponse;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct FakeCompletions {
        calls: Mutex<Vec<CompletionRequest>>,
        status: Option<u16>,
    }

    #[async_trait]
    impl CompletionProvider for FakeCompletions {
        async fn create_completion(
            &self,
            request: &CompletionRequest,
        ) -> Result<UpstreamResponse<CompletionResponse>> {
            self.calls.lock().push(request.clone());
            if let Some(status) = self.status {
                return Ok(UpstreamResponse::failed(status, "Internal Server Error"));
            }
            let n = self.calls.lock().len();
            Ok(UpstreamResponse::ok(
                serde_json::from_value(json!({
                    "id": format!("cmpl-{n}"),
                    "choices": [{"text": format!("{} ...", request.prompt), "index": 0}],
                    "usage": {"prompt_tokens": 2, "completion_tokens": 3, "total_tokens": 5}
                }))
                .unwrap(),
            ))
        }
    }

    /// Returns `[len(text), n]` per text, in reverse order of submission.
    #[derive(Default)]
    struct FakeEmbeddings {
        batches: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbeddings {
        async fn create_embedding(
            &self,
            request: &EmbeddingRequest,
        ) -> Result<UpstreamResponse<EmbeddingResponse>> {
            self.batches.lock().push(request.input.clone());
            let data = request
                .input
                .iter()
                .enumerate()
                .rev()
                .map(|(index, text)| EmbeddingData {
                    embedding: vec![text.len() as f32, index as f32],
                    index,
                })
                .collect();
            Ok(UpstreamResponse::ok(EmbeddingResponse {
                data,
                usage: Some(Usage {
                    prompt_tokens: Some(4),
                    total_tokens: Some(4),
                    ..Default::default()
                }),
            }))
        }
    }

    fn manager(
        completions: Arc<FakeCompletions>,
        embeddings: Arc<FakeEmbeddings>,
    ) -> CacheManager {
        CacheManager::new(Store::open_in_memory().unwrap(), completions, embeddings)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_second_completion_is_served_from_cache() {
        let completions = Arc::new(FakeCompletions::default());
        let cache = manager(completions.clone(), Arc::default());
        let options = CompletionOptions {
            max_tokens: Some(10),
            ..Default::default()
        };

        let first = cache
            .complete_with_cache("text-ada-001", "hello", options.clone())
            .await
            .unwrap();
        let second = cache
            .complete_with_cache("text-ada-001", "hello", options)
            .await
            .unwrap();

        assert_eq!(completions.calls.lock().len(), 1);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(cache.store().log_entries().await.unwrap().len(), 1);

        let stats = cache.get_stats().await;
        assert_eq!((stats.hits, stats.misses, stats.inserts), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_different_options_miss() {
        let completions = Arc::new(FakeCompletions::default());
        let cache = manager(completions.clone(), Arc::default());

        cache
            .complete_with_cache("text-ada-001", "hello", CompletionOptions::default())
            .await
            .unwrap();
        cache
            .complete_with_cache(
                "text-ada-001",
                "hello",
                CompletionOptions {
                    temperature: Some(0.2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(completions.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_cached() {
        let completions = Arc::new(FakeCompletions {
            status: Some(500),
            ..Default::default()
        });
        let cache = manager(completions.clone(), Arc::default());

        for _ in 0..2 {
            let err = cache
                .complete_with_cache("text-ada-001", "hello", CompletionOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ProxyError::Upstream { status: 500, .. }));
        }

        assert_eq!(completions.calls.lock().len(), 2);
        assert!(cache.store().log_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_model_never_reaches_upstream() {
        let completions = Arc::new(FakeCompletions::default());
        let embeddings = Arc::new(FakeEmbeddings::default());
        let cache = manager(completions.clone(), embeddings.clone());

        let err = cache
            .complete_with_cache("gpt-42", "hello", CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::UnknownModel(_)));

        let err = cache
            .embed_with_cache("gpt-42", &strings(&["a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::UnknownModel(_)));

        assert!(completions.calls.lock().is_empty());
        assert!(embeddings.batches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_batch_dedups_and_keeps_input_order() {
        let embeddings = Arc::new(FakeEmbeddings::default());
        let cache = manager(Arc::default(), embeddings.clone());

        let outcome = cache
            .embed_with_cache("text-embedding-ada-002", &strings(&["a", "bb", "a"]))
            .await
            .unwrap();

        assert_eq!(*embeddings.batches.lock(), vec![strings(&["a", "bb"])]);
        assert!(outcome.cache_errors.is_empty());

        let texts: Vec<&str> = outcome.results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "bb", "a"]);
        // Paired by index even though the provider answered in reverse order.
        assert_eq!(outcome.results[0].embedding, vec![1.0, 0.0]);
        assert_eq!(outcome.results[1].embedding, vec![2.0, 1.0]);
        assert_eq!(outcome.results[2].embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_embedding_fetches_only_uncached_texts() {
        let embeddings = Arc::new(FakeEmbeddings::default());
        let cache = manager(Arc::default(), embeddings.clone());
        let model = "text-embedding-ada-002";

        cache.embed_with_cache(model, &strings(&["a"])).await.unwrap();
        let outcome = cache
            .embed_with_cache(model, &strings(&["ccc", "a"]))
            .await
            .unwrap();

        assert_eq!(
            *embeddings.batches.lock(),
            vec![strings(&["a"]), strings(&["ccc"])]
        );
        assert!(!outcome.results[0].cached);
        assert!(outcome.results[1].cached);

        // Fully cached batch makes no call and no ledger row.
        cache.embed_with_cache(model, &strings(&["a", "ccc"])).await.unwrap();
        assert_eq!(embeddings.batches.lock().len(), 2);
        assert_eq!(cache.store().log_entries().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_cached_embedding_is_refetched() {
        let embeddings = Arc::new(FakeEmbeddings::default());
        let cache = manager(Arc::default(), embeddings.clone());
        let model = "text-embedding-ada-002";

        cache
            .store()
            .insert_embedding(&fingerprint_text("a"), model, "a", vec![0xff; 5])
            .await
            .unwrap();

        let outcome = cache.embed_with_cache(model, &strings(&["a"])).await.unwrap();
        assert_eq!(embeddings.batches.lock().len(), 1);
        assert_eq!(outcome.results[0].embedding, vec![1.0, 0.0]);
        assert!(matches!(
            outcome.cache_errors.as_slice(),
            [ProxyError::CorruptEmbedding { len: 5 }]
        ));

        // The fresh row now wins.
        let outcome = cache.embed_with_cache(model, &strings(&["a"])).await.unwrap();
        assert!(outcome.results[0].cached);
        assert!(outcome.cache_errors.is_empty());
    }

    /// On-disk store whose inserts are rejected by the given triggers.
    fn store_with_triggers(dir: &tempfile::TempDir, triggers: &str) -> Store {
        let path = dir.path().join("cache.db");
        let store = Store::open(&path).unwrap();
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch(triggers)
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_failed_completion_insert_still_returns_answer() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_triggers(
            &dir,
            r#"CREATE TRIGGER "reject_requests" BEFORE INSERT ON "requests"
               BEGIN SELECT RAISE(ABORT, 'disk full'); END;"#,
        );
        let completions = Arc::new(FakeCompletions::default());
        let cache = CacheManager::new(
            store,
            completions.clone(),
            Arc::new(FakeEmbeddings::default()),
        );

        let response = cache
            .complete_with_cache("text-ada-001", "hello", CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(response.total_tokens(), Some(5));

        let stats = cache.get_stats().await;
        assert_eq!((stats.inserts, stats.write_failures), (0, 1));
        // The ledger is independent of the cache row.
        assert_eq!(cache.store().log_entries().await.unwrap().len(), 1);

        // Nothing was cached, so the same request goes upstream again.
        cache
            .complete_with_cache("text-ada-001", "hello", CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(completions.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_embedding_insert_keeps_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_triggers(
            &dir,
            r#"CREATE TRIGGER "reject_b" BEFORE INSERT ON "embeddings" WHEN NEW."text" = 'b'
               BEGIN SELECT RAISE(ABORT, 'disk full'); END;"#,
        );
        let embeddings = Arc::new(FakeEmbeddings::default());
        let cache = CacheManager::new(
            store,
            Arc::new(FakeCompletions::default()),
            embeddings.clone(),
        );
        let model = "text-embedding-ada-002";

        let outcome = cache
            .embed_with_cache(model, &strings(&["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.results.iter().all(|r| !r.cached));
        assert!(matches!(
            outcome.cache_errors.as_slice(),
            [ProxyError::WriteFailed(_)]
        ));

        let stats = cache.get_stats().await;
        assert_eq!((stats.inserts, stats.write_failures), (2, 1));

        let outcome = cache
            .embed_with_cache(model, &strings(&["a", "c"]))
            .await
            .unwrap();
        assert!(outcome.results.iter().all(|r| r.cached));
        assert_eq!(embeddings.batches.lock().len(), 1);

        let outcome = cache.embed_with_cache(model, &strings(&["b"])).await.unwrap();
        assert!(!outcome.results[0].cached);
        assert_eq!(embeddings.batches.lock().len(), 2);
    }
}
