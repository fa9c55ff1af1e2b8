// cachegate - Caching and cost-accounting proxy for the OpenAI API
// Author: kelexine (https://github.com/kelexine)

use anyhow::Result;
use cachegate::cache::{CacheManager, Store};
use cachegate::cli::Args;
use cachegate::config::AppConfig;
use cachegate::openai::OpenAiClient;
use cachegate::server::create_router;
use cachegate::utils::logging;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(db) = &args.db {
        config.store.path = db.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting cachegate v{}", env!("CARGO_PKG_VERSION"));

    // Phase 3: Open the cache store (created once, shared for the process lifetime)
    let store = Store::open(&config.store.path)?;

    if args.report {
        print_report(&store).await?;
        return Ok(());
    }

    // Phase 4: Upstream client
    let client = Arc::new(
        OpenAiClient::new(&config.openai)?.with_sanitized_errors(config.logging.sanitize_tokens),
    );
    info!("Forwarding cache misses to {}", client.base_url());

    // Phase 5: Build and start HTTP server
    let cache = CacheManager::new(store, client.clone(), client);
    let app = create_router(config.clone(), cache)?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Phase 6: Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn print_report(store: &Store) -> Result<()> {
    let summary = store.usage_summary().await?;
    if summary.is_empty() {
        println!("No upstream usage recorded.");
        return Ok(());
    }

    println!("{:<10} {:<28} {:>8} {:>12} {:>12}", "kind", "model", "calls", "tokens", "cost (USD)");
    let mut total = 0.0;
    for row in &summary {
        println!(
            "{:<10} {:<28} {:>8} {:>12} {:>12.4}",
            row.kind, row.model, row.calls, row.tokens, row.cost
        );
        total += row.cost;
    }
    println!("{:>62} {:>12.4}", "total", total);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
