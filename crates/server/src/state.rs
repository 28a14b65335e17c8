//! Shared state behind every tool call.

use std::sync::Arc;

use offline_core::config::ConfigError;
use offline_core::{AppConfig, CacheStore, Error, Namespace, Network, OfflineWorker, Registration, WorkerConfig};
use offline_client::canonicalize;
use url::Url;

/// Store, transport and registration shared by the tool handlers.
pub struct ServerState {
    worker_config: WorkerConfig,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    registration: Registration,
}

impl ServerState {
    pub fn new(config: &AppConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> Result<Self, ConfigError> {
        let worker_config = config.worker_config()?;
        let registration = Registration::new(network.clone());
        Ok(Self { worker_config, store, network, registration })
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn origin(&self) -> &Url {
        self.worker_config.origin()
    }

    /// A fresh worker for `namespace`, or for the configured namespace when `None`.
    pub fn worker(&self, namespace: Option<&str>) -> Result<Arc<OfflineWorker>, Error> {
        let mut config = self.worker_config.clone();
        if let Some(namespace) = namespace {
            config = config.with_namespace(Namespace::new(namespace)?);
        }
        Ok(Arc::new(OfflineWorker::new(config, self.store.clone(), self.network.clone())))
    }

    /// Resolve a tool-supplied URL or path against the configured origin.
    pub fn resolve_url(&self, input: &str) -> Result<Url, Error> {
        canonicalize(input, self.origin()).map_err(|e| match e {
            offline_client::UrlError::Empty => Error::InvalidInput("url must not be empty".into()),
            other => Error::InvalidUrl(other.to_string()),
        })
    }
}
