//! cache_install tool implementation.
//!
//! Registers a new worker generation: install its core assets, then activate
//! it (or park it as waiting) according to the configured skip-waiting flag.

use offline_core::WorkerState;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::ServerState;
use crate::tools::json_result;

/// Parameters for the cache_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallParams {
    /// Namespace for the new generation (default: the configured namespace).
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Output from the cache_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallOutput {
    pub namespace: String,
    /// `activated` or `installed` (waiting for promotion).
    pub state: WorkerState,
    /// Number of core assets stored.
    pub staged: usize,
}

/// Implementation of the cache_install tool.
pub async fn install_impl(state: &ServerState, params: CacheInstallParams) -> Result<CallToolResult, McpError> {
    let worker = state.worker(params.namespace.as_deref())?;
    let worker_state = state.registration().register(worker.clone()).await?;
    let staged = worker.cached_keys().await?.len();

    let output = CacheInstallOutput { namespace: worker.namespace().to_string(), state: worker_state, staged };
    Ok(json_result(&output)?)
}
