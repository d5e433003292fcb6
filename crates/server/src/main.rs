//! larder server entry point.
//!
//! Boots the offline worker (install, then activate) and serves it over MCP
//! on stdio. Logging goes to stderr to avoid interfering with the JSON-RPC
//! protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use larder_client::{FetchConfig, Fetcher, HttpFetcher};
use larder_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;
mod worker;

use worker::Worker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let version = config.cache_version();
    let origin = config.origin_url()?;
    let manifest = config.manifest_urls()?;

    tracing::info!(version = %version, db_path = %config.db_path.display(), "Starting larder on stdio transport");

    let store = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening store at {}", config.db_path.display()))?;
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(FetchConfig::from(&config))?);

    let worker = Arc::new(Worker::new(store.clone(), Arc::clone(&fetcher), version, manifest));
    // A redundant worker still serves: every request passes through to the network.
    match worker.install().await {
        Ok(installed) => {
            tracing::info!(generation = %installed.generation, stored = installed.stored.len(), "offline baseline ready");

            let reaped = worker.activate().await.context("activate failed")?;
            if !reaped.failed.is_empty() {
                tracing::warn!(failed = ?reaped.failed, "some stale generations could not be deleted");
            }
            tracing::info!(kept = ?reaped.kept, deleted = ?reaped.deleted, "worker active");
        }
        Err(e) => tracing::warn!(error = %e, "worker redundant, requests will pass through"),
    }

    let handler = handler::LarderServer::new(worker, store, fetcher, origin);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
