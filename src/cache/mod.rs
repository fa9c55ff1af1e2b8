//! Request cache and cost accounting.
//!
//! - `codec`: embedding vectors to and from their stored byte form
//! - `fingerprint`: content addressing of requests and texts
//! - `store`: SQLite persistence for cache rows and the usage ledger
//! - `manager`: the cached completion and embedding operations

// Author: kelexine (https://github.com/kelexine)

pub mod codec;
pub mod fingerprint;
pub mod manager;
pub mod models;
pub mod store;

pub use fingerprint::{fingerprint_request, fingerprint_text};
pub use manager::CacheManager;
pub use models::{
    CacheStats, EmbedOutcome, EmbeddingCacheEntry, EmbeddingResult, RequestCacheEntry,
    RequestKind, UsageLogEntry, UsageSummary,
};
pub use store::Store;
