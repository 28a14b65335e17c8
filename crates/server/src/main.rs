//! mcp-offline server entry point.
//!
//! Boots the MCP server on stdio transport with the configured offline worker
//! registered. Logging goes to stderr to avoid interfering with the JSON-RPC
//! protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use offline_client::{FetchConfig, HttpNetwork};
use offline_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod state;
mod tools;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(namespace = %config.namespace, origin = %config.origin, "Starting mcp-offline server on stdio transport");

    let store = Arc::new(CacheDb::open(&config.db_path).await?);
    let network = Arc::new(HttpNetwork::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        ..Default::default()
    })?);

    let state = Arc::new(state::ServerState::new(&config, store, network)?);

    match state.registration().register(state.worker(None)?).await {
        Ok(worker_state) => tracing::info!(state = %worker_state, "offline worker registered"),
        Err(err) => tracing::warn!(error = %err, "offline worker registration failed; serving network-only"),
    }

    let handler = handler::OfflineServer::new(state.clone());
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    state.registration().settle().await;

    Ok(())
}
