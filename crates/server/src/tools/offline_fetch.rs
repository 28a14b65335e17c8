//! offline_fetch tool implementation.
//!
//! Sends one request through the active offline worker, so it is answered by
//! the same routing and fallback rules a page load would see.

use offline_core::{Error, NetworkError, Request};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ResponseView, default_method, json_result};
use crate::state::ServerState;

/// Parameters for the offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchParams {
    /// Absolute http(s) URL, or a path starting with `/` resolved against the app origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Treat the request as a top-level page load (default: false).
    #[serde(default)]
    pub navigate: bool,

    /// Optional request body for non-GET methods.
    #[serde(default)]
    pub body: Option<String>,
}

/// Output from the offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchOutput {
    pub method: String,
    #[serde(flatten)]
    pub response: ResponseView,
}

/// Implementation of the offline_fetch tool.
pub async fn fetch_impl(state: &ServerState, params: OfflineFetchParams) -> Result<CallToolResult, McpError> {
    if params.method.trim().is_empty() {
        return Err(Error::InvalidInput("method must not be empty".into()).into());
    }

    let url = state.resolve_url(&params.url)?;
    let mut request = Request::new(params.method.trim(), url).with_navigation(params.navigate);
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let response = state.registration().fetch(&request).await?;
    if response.is_error() {
        return Err(Error::Network(NetworkError::Unreachable(request.url().to_string())).into());
    }

    let output = OfflineFetchOutput { method: request.method().to_string(), response: ResponseView::from(&response) };
    Ok(json_result(&output)?)
}
