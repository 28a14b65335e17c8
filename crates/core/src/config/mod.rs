//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MCP_OFFLINE_*)
//! 2. TOML config file (if MCP_OFFLINE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::request::Namespace;
use crate::routing::{DEFAULT_STATIC_EXTENSIONS, DEFAULT_STATIC_PREFIX, RoutingRules};
use crate::worker::WorkerConfig;

mod validation;

pub use validation::ConfigError;

/// Cache namespace shipped with the current deploy.
pub const DEFAULT_NAMESPACE: &str = "gastos-pwa-v1";

/// Documents and assets the app needs to boot with no network.
pub const DEFAULT_CORE_ASSETS: &[&str] = &["/", "/manifest.json", "/icons/icon-192.png", "/icons/icon-512.png"];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MCP_OFFLINE_*)
/// 2. TOML config file (if MCP_OFFLINE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache namespace for this deploy. Bump it to invalidate every cached entry.
    ///
    /// Set via MCP_OFFLINE_NAMESPACE environment variable.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Origin the app is served from; core asset paths resolve against it.
    ///
    /// Set via MCP_OFFLINE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Absolute paths pre-cached at install time.
    ///
    /// Set via MCP_OFFLINE_CORE_ASSETS environment variable (TOML array).
    #[serde(default = "default_core_assets")]
    pub core_assets: Vec<String>,

    /// Path prefix of hashed static build output.
    ///
    /// Set via MCP_OFFLINE_STATIC_PREFIX environment variable.
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    /// File extensions served cache-first.
    ///
    /// Set via MCP_OFFLINE_STATIC_EXTENSIONS environment variable (TOML array).
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,

    /// Activate a freshly installed worker without waiting for the old one to go idle.
    ///
    /// Set via MCP_OFFLINE_SKIP_WAITING environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Path to SQLite cache database.
    ///
    /// Set via MCP_OFFLINE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via MCP_OFFLINE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via MCP_OFFLINE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via MCP_OFFLINE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.into()
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_core_assets() -> Vec<String> {
    DEFAULT_CORE_ASSETS.iter().map(|s| s.to_string()).collect()
}

fn default_static_prefix() -> String {
    DEFAULT_STATIC_PREFIX.into()
}

fn default_static_extensions() -> Vec<String> {
    DEFAULT_STATIC_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mcp-offline-cache.sqlite")
}

fn default_user_agent() -> String {
    "mcp-offline/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            origin: default_origin(),
            core_assets: default_core_assets(),
            static_prefix: default_static_prefix(),
            static_extensions: default_static_extensions(),
            skip_waiting: true,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MCP_OFFLINE_`
    /// 2. TOML file from `MCP_OFFLINE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MCP_OFFLINE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(
            Env::prefixed("MCP_OFFLINE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        ))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed origin URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Static-asset routing rules.
    pub fn routing_rules(&self) -> RoutingRules {
        RoutingRules::new(&self.static_prefix, &self.static_extensions)
    }

    /// Worker settings for the configured namespace.
    pub fn worker_config(&self) -> Result<WorkerConfig, ConfigError> {
        let namespace = Namespace::new(&self.namespace)
            .map_err(|e| ConfigError::Invalid { field: "namespace".into(), reason: e.to_string() })?;

        Ok(WorkerConfig::new(namespace, self.origin_url()?)
            .with_core_assets(self.core_assets.clone())
            .with_rules(self.routing_rules())
            .with_skip_waiting(self.skip_waiting))
    }
}
