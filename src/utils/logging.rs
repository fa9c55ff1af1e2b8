//! Structured logging and secret-redaction utilities.
//!
//! This module configures the `tracing` ecosystem for the application and
//! provides a helper to keep API keys out of log sinks.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::LoggingConfig;
use crate::error::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber for the application.
///
/// Supports two output formats:
/// - `json`: Structured JSON logs for production ingestion.
/// - `pretty` (default): Human-readable, colorized output for development.
///
/// Log levels are controlled via the `RUST_LOG` environment variable or
/// the provided `LoggingConfig`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

/// Sanitizes secrets from log messages.
///
/// Replaces every OpenAI secret key (`sk-...`) and the credential of any
/// `Bearer ...` header with a `\[REDACTED\]` placeholder.
pub fn sanitize(input: &str) -> String {
    let mut result = redact_after(input, "sk-", "[REDACTED_API_KEY]");
    result = redact_after(&result, "Bearer ", "Bearer [REDACTED]");
    result
}

/// Replace every occurrence of `marker` plus the token that follows it.
///
/// Only matches at the start of a word, so `risk-free` is left alone.
fn redact_after(input: &str, marker: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(marker) {
        out.push_str(&rest[..pos]);
        let token = &rest[pos + marker.len()..];

        if out.chars().next_back().is_some_and(char::is_alphanumeric) {
            out.push_str(marker);
            rest = token;
            continue;
        }

        // Token ends at whitespace or a quote
        let end = token
            .find(|c: char| c.is_whitespace() || c == '"' || c == '\'')
            .unwrap_or(token.len());
        if end == 0 {
            out.push_str(marker);
        } else {
            out.push_str(replacement);
        }
        rest = &token[end..];
    }

    out.push_str(rest);
    out
}
