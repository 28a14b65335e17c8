//! Offline worker lifecycle.
//!
//! One [`OfflineWorker`] exists per deployed cache namespace. It moves through
//! an explicit state machine:
//!
//! ```text
//! Uninstalled -> Installing -> Installed -> Activating -> Activated
//!                     |                                      |
//!                     +--------------> Redundant <-----------+
//! ```
//!
//! `install` stages the core assets, `activate` sweeps every other namespace
//! and then starts serving requests through the routing policy. Each transition
//! is an async fn; awaiting it is waiting for the transition to complete.

mod strategy;

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use url::Url;

use crate::Error;
use crate::cache::{CacheHandle, CacheStore};
use crate::config::DEFAULT_CORE_ASSETS;
use crate::network::Network;
use crate::request::{Namespace, Request, RequestKey, Response};
use crate::routing::{RoutingDecision, RoutingRules};

/// Where a worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Uninstalled,
    Installing,
    /// Installed and waiting for activation.
    Installed,
    Activating,
    Activated,
    /// Failed to install, or replaced by a newer worker.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Uninstalled => "uninstalled",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Static settings for one worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    namespace: Namespace,
    origin: Url,
    core_assets: Vec<String>,
    rules: RoutingRules,
    skip_waiting: bool,
}

impl WorkerConfig {
    /// Defaults: the standard core asset manifest, default routing rules, and
    /// `skip_waiting` enabled.
    pub fn new(namespace: Namespace, origin: Url) -> Self {
        Self {
            namespace,
            origin,
            core_assets: DEFAULT_CORE_ASSETS.iter().map(|s| s.to_string()).collect(),
            rules: RoutingRules::default(),
            skip_waiting: true,
        }
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_core_assets(mut self, core_assets: Vec<String>) -> Self {
        self.core_assets = core_assets;
        self
    }

    pub fn with_rules(mut self, rules: RoutingRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_skip_waiting(mut self, skip_waiting: bool) -> Self {
        self.skip_waiting = skip_waiting;
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn core_assets(&self) -> &[String] {
        &self.core_assets
    }

    pub fn rules(&self) -> &RoutingRules {
        &self.rules
    }

    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting
    }

    /// The root document served to navigations that have nothing cached.
    pub fn root_url(&self) -> Url {
        let mut root = self.origin.clone();
        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);
        root
    }

    /// Core asset paths resolved against the origin.
    pub fn core_asset_urls(&self) -> Result<Vec<Url>, Error> {
        self.core_assets
            .iter()
            .map(|path| {
                self.origin
                    .join(path)
                    .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
            })
            .collect()
    }
}

/// Lifecycle controller for one cache namespace.
pub struct OfflineWorker {
    config: WorkerConfig,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    /// Also the activation fence: `activate` holds the write half for the whole sweep.
    state: RwLock<WorkerState>,
    handle: OnceLock<CacheHandle>,
    /// Background cache writes not yet finished.
    pending: Mutex<JoinSet<()>>,
}

impl fmt::Debug for OfflineWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineWorker")
            .field("namespace", &self.config.namespace)
            .finish_non_exhaustive()
    }
}

impl OfflineWorker {
    pub fn new(config: WorkerConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> Self {
        Self {
            config,
            store,
            network,
            state: RwLock::new(WorkerState::Uninstalled),
            handle: OnceLock::new(),
            pending: Mutex::new(JoinSet::new()),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn namespace(&self) -> &Namespace {
        &self.config.namespace
    }

    pub fn skip_waiting(&self) -> bool {
        self.config.skip_waiting
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Open the namespace and stage every core asset.
    ///
    /// All assets are fetched before anything is written; the batch is then
    /// stored in one transaction. Re-running install on an installed worker
    /// refreshes the same keys.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` unless the worker is uninstalled or installed
    /// - `Error::InvalidManifestAsset` if any asset fails to fetch or returns a
    ///   non-2xx status; the worker becomes redundant
    /// - store errors while staging; the worker becomes redundant
    pub async fn install(&self) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            match *state {
                WorkerState::Uninstalled | WorkerState::Installed => *state = WorkerState::Installing,
                other => return Err(Error::InvalidState { action: "install", state: other }),
            }
        }

        tracing::info!(namespace = %self.config.namespace, "installing offline worker");

        let result = self.stage_core_assets().await;
        let mut state = self.state.write().await;
        match result {
            Ok(staged) => {
                *state = WorkerState::Installed;
                tracing::info!(namespace = %self.config.namespace, staged, "offline worker installed");
                Ok(())
            }
            Err(err) => {
                *state = WorkerState::Redundant;
                tracing::warn!(namespace = %self.config.namespace, error = %err, "offline worker install failed");
                Err(err)
            }
        }
    }

    async fn stage_core_assets(&self) -> Result<usize, Error> {
        let urls = self.config.core_asset_urls()?;
        let handle = self.store.open(&self.config.namespace).await?;

        let mut entries = Vec::with_capacity(urls.len());
        for url in urls {
            let request = Request::get(url);
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::InvalidManifestAsset { url: request.url().to_string(), reason: e.to_string() })?;
            if !response.ok() {
                return Err(Error::InvalidManifestAsset {
                    url: request.url().to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            entries.push((request.key(), response));
        }

        let staged = entries.len();
        self.store.put_all(&handle, entries).await?;
        let _ = self.handle.set(handle);
        Ok(staged)
    }

    /// Sweep stale namespaces and start serving.
    ///
    /// Requests reaching [`handle`](Self::handle) during the sweep wait until
    /// it completes. A namespace that fails to delete is logged and left for
    /// the next activation.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the worker is installed.
    pub async fn activate(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != WorkerState::Installed {
            return Err(Error::InvalidState { action: "activate", state: *state });
        }
        *state = WorkerState::Activating;

        let removed = self.sweep_stale_namespaces().await;

        *state = WorkerState::Activated;
        tracing::info!(namespace = %self.config.namespace, removed, "offline worker activated");
        Ok(())
    }

    async fn sweep_stale_namespaces(&self) -> usize {
        let namespaces = match self.store.namespaces().await {
            Ok(namespaces) => namespaces,
            Err(err) => {
                tracing::warn!(error = %err, "could not list cache namespaces; skipping sweep");
                return 0;
            }
        };

        let mut removed = 0;
        for stale in namespaces.iter().filter(|ns| **ns != self.config.namespace) {
            match self.store.delete(stale).await {
                Ok(true) => {
                    removed += 1;
                    tracing::debug!(namespace = %stale, "deleted stale cache namespace");
                }
                Ok(false) => {}
                Err(err) => tracing::warn!(namespace = %stale, error = %err, "failed to delete stale namespace"),
            }
        }
        removed
    }

    /// Mark the worker as replaced. It stops serving from its namespace.
    pub async fn retire(&self) {
        *self.state.write().await = WorkerState::Redundant;
        tracing::debug!(namespace = %self.config.namespace, "offline worker retired");
    }

    /// Intercept one request.
    ///
    /// Until the worker is activated the request goes straight to the network,
    /// as it would for a client with no worker. Store failures never surface
    /// here; only network failures without a cached fallback do.
    pub async fn handle(&self, request: &Request) -> Result<Response, Error> {
        let state = self.state().await;
        if state != WorkerState::Activated {
            tracing::debug!(url = %request.url(), %state, "worker not active; forwarding");
            return self.pass_through(request).await;
        }

        let decision = self.config.rules.classify(request);
        tracing::debug!(method = request.method(), url = %request.url(), ?decision, "routing request");

        match decision {
            RoutingDecision::NetworkFirstWithCacheFallback => self.network_first(request).await,
            RoutingDecision::CacheFirstWithNetworkRefill => self.cache_first(request).await,
            RoutingDecision::PassThrough => self.pass_through(request).await,
        }
    }

    /// Stored response for a GET of `request`'s URL, if any.
    pub async fn match_cached(&self, request: &Request) -> Option<Response> {
        if !request.is_get() {
            return None;
        }
        self.lookup(&request.key()).await
    }

    /// Keys stored in this worker's namespace, oldest first.
    pub async fn cached_keys(&self) -> Result<Vec<RequestKey>, Error> {
        match self.handle.get() {
            Some(handle) => self.store.keys(handle).await,
            None => Ok(Vec::new()),
        }
    }

    /// Wait for every scheduled cache write to finish.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        while let Some(joined) = pending.join_next().await {
            if let Err(err) = joined {
                tracing::warn!(error = %err, "cache write task did not complete");
            }
        }
    }
}
