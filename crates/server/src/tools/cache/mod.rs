//! Cache-related MCP tools.
//!
//! This module provides tools for installing a cache generation and
//! inspecting what the active worker has stored.

pub mod activate;
pub mod get;
pub mod install;
pub mod status;

pub use activate::activate_impl;
pub use get::{CacheGetParams, get_impl};
pub use install::{CacheInstallParams, install_impl};
pub use status::status_impl;
