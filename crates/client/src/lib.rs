//! Client code for mcp-offline.
//!
//! This crate provides the HTTP transport the offline worker fetches through,
//! and URL canonicalization shared by the server.

pub mod fetch;

pub use fetch::{FetchConfig, HttpNetwork, UrlError, canonicalize};
