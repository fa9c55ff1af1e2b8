//! Cache records, ledger rows and statistics.

// Author: kelexine (https://github.com/kelexine)

use crate::error::ProxyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which upstream endpoint a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Completion,
    Embedding,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Completion => "completion",
            RequestKind::Embedding => "embedding",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completion" => Ok(RequestKind::Completion),
            "embedding" => Ok(RequestKind::Embedding),
            other => Err(ProxyError::Internal(format!("unknown request kind: {other}"))),
        }
    }
}

/// A cached upstream request and its response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestCacheEntry {
    pub fingerprint: String,
    pub kind: RequestKind,
    pub request_json: String,
    pub response_json: String,
    pub tokens: Option<u64>,
    pub model: String,
    pub cost: f64,
    pub created_at: DateTime<Utc>,
}

/// A cached embedding vector, keyed by text fingerprint and model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingCacheEntry {
    pub fingerprint: String,
    pub model: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// One row of the usage ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageLogEntry {
    pub kind: RequestKind,
    pub model: String,
    pub tokens: u64,
    pub cost: f64,
    pub time: DateTime<Utc>,
}

/// Ledger totals for one (kind, model) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub kind: RequestKind,
    pub model: String,
    pub calls: u64,
    pub tokens: u64,
    pub cost: f64,
}

/// An embedding returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingResult {
    pub text: String,
    pub embedding: Vec<f32>,
    /// Whether the vector was served from the cache.
    pub cached: bool,
}

/// Result of a batch embedding call.
///
/// `results` has one entry per input text, in input order. Failed cache
/// writes, failed ledger appends and undecodable cached rows do not fail the
/// call; they are collected in `cache_errors`.
#[derive(Debug, Default)]
pub struct EmbedOutcome {
    pub results: Vec<EmbeddingResult>,
    pub cache_errors: Vec<ProxyError>,
}

/// Counters for cache operations since process start.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the store.
    pub hits: u64,
    /// Lookups that went upstream.
    pub misses: u64,
    /// Rows written to the store.
    pub inserts: u64,
    /// Cache or ledger writes that failed.
    pub write_failures: u64,
    /// Stored embeddings that could not be decoded.
    pub corrupt_reads: u64,
}
