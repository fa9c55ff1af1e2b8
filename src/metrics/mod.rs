// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics,
    REQUESTS_TOTAL,
    REQUEST_DURATION,
    UPSTREAM_CALLS,
    UPSTREAM_DURATION,
    TOKENS_TOTAL,
    COST_TOTAL,
    CACHE_OPERATIONS,
};

/// Helper to record request metrics
pub fn record_request(endpoint: &str, status_code: u16, duration_secs: f64) {
    REQUESTS_TOTAL
        .with_label_values(&[endpoint, &status_code.to_string()])
        .inc();

    REQUEST_DURATION
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

/// Helper to record OpenAI API call metrics
pub fn record_upstream_call(kind: &str, model: &str, status_code: u16, duration_secs: f64) {
    UPSTREAM_CALLS
        .with_label_values(&[kind, model, &status_code.to_string()])
        .inc();

    UPSTREAM_DURATION
        .with_label_values(&[kind])
        .observe(duration_secs);
}

/// Helper to record billed usage
pub fn record_usage(kind: &str, model: &str, tokens: u64, cost: f64) {
    if tokens > 0 {
        TOKENS_TOTAL
            .with_label_values(&[kind, model])
            .inc_by(tokens as f64);
    }
    if cost > 0.0 {
        COST_TOTAL
            .with_label_values(&[kind, model])
            .inc_by(cost);
    }
}

/// Helper to record cache operations
pub fn record_cache_hit(kind: &str) {
    CACHE_OPERATIONS.with_label_values(&[kind, "hit"]).inc();
}

pub fn record_cache_miss(kind: &str) {
    CACHE_OPERATIONS.with_label_values(&[kind, "miss"]).inc();
}

pub fn record_cache_insert(kind: &str) {
    CACHE_OPERATIONS.with_label_values(&[kind, "insert"]).inc();
}

pub fn record_write_failure(kind: &str) {
    CACHE_OPERATIONS.with_label_values(&[kind, "write_failure"]).inc();
}

pub fn record_corrupt_read(kind: &str) {
    CACHE_OPERATIONS.with_label_values(&[kind, "corrupt"]).inc();
}
