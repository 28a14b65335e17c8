//! MCP tool implementations.
//!
//! This module contains all tools exposed by the mcp-offline server.

pub mod cache;
pub mod offline_fetch;

use offline_core::{Error, Response};
use rmcp::model::{CallToolResult, Content};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use offline_fetch::{OfflineFetchParams, fetch_impl};

fn default_method() -> String {
    offline_core::request::GET.to_string()
}

/// A response as tools report it. Bodies are decoded lossily as UTF-8.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseView {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// Header name/value pairs in received order.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl From<&Response> for ResponseView {
    fn from(response: &Response) -> Self {
        Self {
            url: response.url.clone(),
            status: response.status,
            content_type: response.content_type().map(str::to_string),
            headers: response.headers.clone(),
            body: String::from_utf8_lossy(&response.body).into_owned(),
        }
    }
}

/// Serialize a tool output as pretty JSON text content.
fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, Error> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
