//! cache_get tool implementation.
//!
//! Reads a stored entry from the active namespace without touching the network.

use offline_core::{Error, Request};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::ServerState;
use crate::tools::{ResponseView, default_method, json_result};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL or origin-relative path of the stored request.
    pub url: String,

    /// HTTP method (default: GET). Only GET entries are ever stored.
    #[serde(default = "default_method")]
    pub method: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub namespace: String,
    #[serde(flatten)]
    pub response: ResponseView,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(state: &ServerState, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = state.resolve_url(&params.url)?;
    let request = Request::new(params.method.trim(), url);

    let worker = state
        .registration()
        .active()
        .await
        .ok_or_else(|| Error::CacheMiss("no active offline worker".into()))?;

    let response = worker
        .match_cached(&request)
        .await
        .ok_or_else(|| Error::CacheMiss(request.key().to_string()))?;

    let output = CacheGetOutput { namespace: worker.namespace().to_string(), response: ResponseView::from(&response) };
    Ok(json_result(&output)?)
}
