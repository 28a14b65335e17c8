//! cache_status tool implementation.

use offline_core::WorkerState;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::ServerState;
use crate::tools::json_result;

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    /// State of the active worker; absent when requests go straight to the network.
    pub state: Option<WorkerState>,
    pub active_namespace: Option<String>,
    /// Namespace of an installed worker waiting for activation.
    pub waiting_namespace: Option<String>,
    /// Every namespace present in the store.
    pub namespaces: Vec<String>,
    /// URLs stored in the active namespace, oldest first.
    pub entries: Vec<String>,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(state: &ServerState) -> Result<CallToolResult, McpError> {
    let registration = state.registration();

    let entries = match registration.active().await {
        Some(worker) => worker.cached_keys().await?.into_iter().map(|key| key.to_string()).collect(),
        None => Vec::new(),
    };

    let output = CacheStatusOutput {
        state: registration.state().await,
        active_namespace: registration.active_namespace().await.map(|ns| ns.to_string()),
        waiting_namespace: registration.waiting().await.map(|worker| worker.namespace().to_string()),
        namespaces: state.store().namespaces().await?.iter().map(|ns| ns.to_string()).collect(),
        entries,
    };
    Ok(json_result(&output)?)
}
