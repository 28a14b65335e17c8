//! cache_activate tool implementation.
//!
//! Promotes the worker parked by cache_install when skip-waiting is off.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::ServerState;
use crate::tools::json_result;

/// Output from the cache_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheActivateOutput {
    /// Whether a waiting worker was activated.
    pub promoted: bool,
    pub active_namespace: Option<String>,
    /// Every namespace present in the store after activation.
    pub namespaces: Vec<String>,
}

/// Implementation of the cache_activate tool.
pub async fn activate_impl(state: &ServerState) -> Result<CallToolResult, McpError> {
    let registration = state.registration();
    let promoted = registration.promote_waiting().await?;

    let output = CacheActivateOutput {
        promoted,
        active_namespace: registration.active_namespace().await.map(|ns| ns.to_string()),
        namespaces: state.store().namespaces().await?.iter().map(|ns| ns.to_string()).collect(),
    };
    Ok(json_result(&output)?)
}
