//! Per-request routing policy.
//!
//! Classification is a pure function of method, URL path and the navigation
//! flag. The worker consumes the returned [`RoutingDecision`] and never
//! decides strategy on its own.

use serde::{Deserialize, Serialize};

use crate::request::Request;

/// Path prefix the frontend build emits hashed static chunks under.
pub const DEFAULT_STATIC_PREFIX: &str = "/_next/static/";

/// File extensions treated as static assets.
pub const DEFAULT_STATIC_EXTENSIONS: &[&str] =
    &["js", "css", "png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "json", "txt", "woff", "woff2"];

/// Strategy chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Try the network, refill the cache, fall back to it when offline.
    NetworkFirstWithCacheFallback,
    /// Serve from the cache; only go to the network on a miss.
    CacheFirstWithNetworkRefill,
    /// Forward untouched. Used for everything that is not a GET.
    PassThrough,
}

/// Static-asset matching rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRules {
    static_prefix: String,
    static_extensions: Vec<String>,
}

impl Default for RoutingRules {
    fn default() -> Self {
        Self::new(DEFAULT_STATIC_PREFIX, DEFAULT_STATIC_EXTENSIONS.iter().copied())
    }
}

impl RoutingRules {
    /// Extensions are compared case-insensitively and may be given with or
    /// without a leading dot.
    pub fn new<I, S>(static_prefix: impl Into<String>, static_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let static_extensions = static_extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { static_prefix: static_prefix.into(), static_extensions }
    }

    pub fn static_prefix(&self) -> &str {
        &self.static_prefix
    }

    pub fn static_extensions(&self) -> &[String] {
        &self.static_extensions
    }

    /// Pick the strategy for `request`.
    ///
    /// Navigation wins over extension matching, so a navigated `/report.json`
    /// is still network-first.
    pub fn classify(&self, request: &Request) -> RoutingDecision {
        if !request.is_get() {
            return RoutingDecision::PassThrough;
        }
        if request.is_navigation() {
            return RoutingDecision::NetworkFirstWithCacheFallback;
        }
        if self.is_static_asset(request.url().path()) {
            return RoutingDecision::CacheFirstWithNetworkRefill;
        }
        RoutingDecision::NetworkFirstWithCacheFallback
    }

    fn is_static_asset(&self, path: &str) -> bool {
        if path.starts_with(&self.static_prefix) {
            return true;
        }
        match path.rsplit_once('.') {
            Some((_, ext)) => self.static_extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

/// Classify with the default rules.
pub fn classify(request: &Request) -> RoutingDecision {
    RoutingRules::default().classify(request)
}
