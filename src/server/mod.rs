//! Axum-based HTTP server for cachegate.
//!
//! Exposes the cached completion and embedding operations, both in the
//! simple query-string form (`/complete`, `/embed`) and in the OpenAI body
//! shape (`/v1/completions`, `/v1/embeddings`), plus health and metrics.
//!
//! # Components
//!
//! - `handlers`: Endpoint implementations and argument validation.
//! - `middleware`: Request ID and per-route metrics layers.
//! - `routes`: The router that ties everything together.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod handlers;
mod middleware;
mod routes;

pub use handlers::CACHE_ERRORS_HEADER;
pub use routes::{create_router, AppState};
