// HTTP routes configuration
// Author: kelexine (https://github.com/kelexine)

use super::handlers::{
    complete_handler, completions_handler, embed_handler, embeddings_handler, health_handler,
    metrics_handler, ping_handler,
};
use super::middleware::{request_id_layers, track_metrics};
use crate::cache::CacheManager;
use crate::config::AppConfig;
use crate::error::Result;
use axum::{middleware, routing::{get, post}, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub cache: Arc<CacheManager>,
}

pub fn create_router(config: AppConfig, cache: CacheManager) -> Result<Router> {
    let state = AppState {
        config,
        cache: Arc::new(cache),
    };

    let (set_request_id, propagate_request_id) = request_id_layers();

    let app = Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/complete", get(complete_handler))
        .route("/embed", get(embed_handler))
        .route("/v1/completions", post(completions_handler))
        .route("/v1/embeddings", post(embeddings_handler))
        .route_layer(middleware::from_fn(track_metrics))
        // Embedding batches can be large
        .layer(tower_http::limit::RequestBodyLimitLayer::new(16 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id)
        .layer(set_request_id)
        .with_state(state);

    Ok(app)
}
