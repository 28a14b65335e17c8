//! Core types and shared functionality for mcp-offline.
//!
//! This crate provides:
//! - Versioned response store with SQLite backend
//! - Routing policy for intercepted requests
//! - Offline worker lifecycle (install, activate, intercept) and registration
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod network;
pub mod registration;
pub mod request;
pub mod routing;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheDb, CacheHandle, CacheStore};
pub use config::AppConfig;
pub use error::Error;
pub use network::{Network, NetworkError};
pub use registration::Registration;
pub use request::{Namespace, Request, RequestKey, Response, ResponseKind};
pub use routing::{RoutingDecision, RoutingRules, classify};
pub use worker::{OfflineWorker, WorkerConfig, WorkerState};
