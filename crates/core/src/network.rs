//! Network seam used by the worker.
//!
//! The worker never talks to a transport directly; the host injects an
//! implementation of [`Network`] (see `offline-client` for the reqwest one).

use async_trait::async_trait;

use crate::request::{Request, Response};

/// Transport-level failures. HTTP error statuses are responses, not failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("server unreachable: {0}")]
    Unreachable(String),

    #[error("request aborted")]
    Aborted,

    #[error("response too large: {0}")]
    TooLarge(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Something that can perform a request against the real network.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request once. Retries are left to the caller.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}
