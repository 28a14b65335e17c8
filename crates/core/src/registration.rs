//! Host-side registration: which worker is serving and which one is waiting.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::Error;
use crate::network::Network;
use crate::request::{Namespace, Request, Response};
use crate::worker::{OfflineWorker, WorkerState};

/// Routes requests to the active worker and drives new workers through
/// install and activation.
pub struct Registration {
    network: Arc<dyn Network>,
    active: RwLock<Option<Arc<OfflineWorker>>>,
    waiting: Mutex<Option<Arc<OfflineWorker>>>,
}

impl Registration {
    /// A registration with no worker yet; every request goes to the network.
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self { network, active: RwLock::new(None), waiting: Mutex::new(None) }
    }

    /// Install `worker` and, when allowed, activate it.
    ///
    /// The worker is activated right away if it skips waiting or if nothing is
    /// active yet; otherwise it waits for [`promote_waiting`](Self::promote_waiting).
    /// A failed install leaves the current active worker in place.
    ///
    /// Returns the state the new worker ended in.
    pub async fn register(&self, worker: Arc<OfflineWorker>) -> Result<WorkerState, Error> {
        worker.install().await?;

        let has_active = self.active.read().await.is_some();
        if worker.skip_waiting() || !has_active {
            self.take_over(worker).await?;
            return Ok(WorkerState::Activated);
        }

        tracing::info!(namespace = %worker.namespace(), "offline worker waiting for activation");
        let previous = self.waiting.lock().await.replace(worker);
        if let Some(previous) = previous {
            previous.retire().await;
        }
        Ok(WorkerState::Installed)
    }

    /// Activate the waiting worker, if any. Returns whether one was promoted.
    pub async fn promote_waiting(&self) -> Result<bool, Error> {
        let waiting = self.waiting.lock().await.take();
        match waiting {
            Some(worker) => {
                self.take_over(worker).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Activation runs while holding the `active` write lock, so no request is
    /// routed anywhere until the sweep has finished. A worker still parked as
    /// waiting is older than `worker` and its namespace is about to be swept,
    /// so it is retired first.
    async fn take_over(&self, worker: Arc<OfflineWorker>) -> Result<(), Error> {
        let mut active = self.active.write().await;

        let parked = self.waiting.lock().await.take();
        if let Some(parked) = parked
            && !Arc::ptr_eq(&parked, &worker)
        {
            tracing::debug!(namespace = %parked.namespace(), "discarding superseded waiting worker");
            parked.retire().await;
        }

        worker.activate().await?;

        let previous = active.replace(Arc::clone(&worker));
        drop(active);

        if let Some(previous) = previous
            && !Arc::ptr_eq(&previous, &worker)
        {
            previous.settle().await;
            previous.retire().await;
        }
        Ok(())
    }

    /// Serve a request through the active worker, or straight from the
    /// network when none is active.
    pub async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        match self.active().await {
            Some(worker) => worker.handle(request).await,
            None => Ok(self.network.fetch(request).await?),
        }
    }

    pub async fn active(&self) -> Option<Arc<OfflineWorker>> {
        self.active.read().await.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<OfflineWorker>> {
        self.waiting.lock().await.clone()
    }

    pub async fn active_namespace(&self) -> Option<Namespace> {
        self.active().await.map(|worker| worker.namespace().clone())
    }

    /// State of the active worker; `None` while no worker is active.
    pub async fn state(&self) -> Option<WorkerState> {
        let worker = self.active().await?;
        Some(worker.state().await)
    }

    /// Wait for the active worker's background cache writes.
    pub async fn settle(&self) {
        if let Some(worker) = self.active().await {
            worker.settle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheDb, CacheStore};
    use crate::testing::{FakeNetwork, origin, worker_config};
    use std::collections::BTreeSet;

    async fn setup() -> (Arc<CacheDb>, Arc<FakeNetwork>, Registration) {
        let store = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(FakeNetwork::serving_core_assets());
        let registration = Registration::new(network.clone());
        (store, network, registration)
    }

    fn worker(store: &Arc<CacheDb>, network: &Arc<FakeNetwork>, ns: &str, skip_waiting: bool) -> Arc<OfflineWorker> {
        Arc::new(OfflineWorker::new(
            worker_config(ns).with_skip_waiting(skip_waiting),
            store.clone(),
            network.clone(),
        ))
    }

    #[tokio::test]
    async fn test_fetch_without_worker_goes_to_network() {
        let (_, network, registration) = setup().await;
        network.respond("/api/entries", 200, "[]");

        let response = registration.fetch(&Request::get(origin().join("/api/entries").unwrap())).await.unwrap();
        assert_eq!(response.body.as_ref(), b"[]");
        assert!(registration.active_namespace().await.is_none());
        assert_eq!(registration.state().await, None);
    }

    #[tokio::test]
    async fn test_register_activates_first_worker() {
        let (store, network, registration) = setup().await;
        let v1 = worker(&store, &network, "v1", false);

        let state = registration.register(v1.clone()).await.unwrap();
        assert_eq!(state, WorkerState::Activated);
        assert_eq!(v1.state().await, WorkerState::Activated);
        assert_eq!(registration.state().await, Some(WorkerState::Activated));
        assert_eq!(registration.active_namespace().await.unwrap().as_str(), "v1");
    }

    #[tokio::test]
    async fn test_skip_waiting_replaces_active_and_sweeps() {
        let (store, network, registration) = setup().await;
        let v1 = worker(&store, &network, "v1", true);
        let v2 = worker(&store, &network, "v2", true);

        registration.register(v1.clone()).await.unwrap();
        registration.register(v2.clone()).await.unwrap();

        assert_eq!(registration.active_namespace().await.unwrap().as_str(), "v2");
        assert_eq!(v1.state().await, WorkerState::Redundant);
        assert_eq!(store.namespaces().await.unwrap(), BTreeSet::from([Namespace::new("v2").unwrap()]));
    }

    #[tokio::test]
    async fn test_waiting_worker_until_promoted() {
        let (store, network, registration) = setup().await;
        registration.register(worker(&store, &network, "v1", true)).await.unwrap();

        let v2 = worker(&store, &network, "v2", false);
        let state = registration.register(v2.clone()).await.unwrap();
        assert_eq!(state, WorkerState::Installed);
        assert_eq!(registration.active_namespace().await.unwrap().as_str(), "v1");
        assert!(registration.waiting().await.is_some());

        assert!(registration.promote_waiting().await.unwrap());
        assert_eq!(registration.active_namespace().await.unwrap().as_str(), "v2");
        assert!(registration.waiting().await.is_none());
        assert!(!registration.promote_waiting().await.unwrap());
    }

    #[tokio::test]
    async fn test_newer_waiting_worker_retires_older_one() {
        let (store, network, registration) = setup().await;
        registration.register(worker(&store, &network, "v1", true)).await.unwrap();

        let v2 = worker(&store, &network, "v2", false);
        let v3 = worker(&store, &network, "v3", false);
        registration.register(v2.clone()).await.unwrap();
        registration.register(v3.clone()).await.unwrap();

        assert_eq!(v2.state().await, WorkerState::Redundant);
        assert_eq!(registration.waiting().await.unwrap().namespace().as_str(), "v3");
    }

    #[tokio::test]
    async fn test_skip_waiting_worker_discards_parked_one() {
        let (store, network, registration) = setup().await;
        registration.register(worker(&store, &network, "v1", true)).await.unwrap();

        let v2 = worker(&store, &network, "v2", false);
        registration.register(v2.clone()).await.unwrap();
        registration.register(worker(&store, &network, "v3", true)).await.unwrap();

        assert!(registration.waiting().await.is_none());
        assert_eq!(v2.state().await, WorkerState::Redundant);
        assert!(!registration.promote_waiting().await.unwrap());
        assert_eq!(registration.active_namespace().await.unwrap().as_str(), "v3");
        assert_eq!(store.namespaces().await.unwrap(), BTreeSet::from([Namespace::new("v3").unwrap()]));
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_worker() {
        let (store, network, registration) = setup().await;
        registration.register(worker(&store, &network, "v1", true)).await.unwrap();

        network.fail("/icons/icon-512.png");
        let v2 = worker(&store, &network, "v2", true);
        let result = registration.register(v2.clone()).await;

        assert!(matches!(result, Err(Error::InvalidManifestAsset { .. })));
        assert_eq!(v2.state().await, WorkerState::Redundant);
        assert_eq!(registration.active_namespace().await.unwrap().as_str(), "v1");

        network.set_offline(true);
        let root = registration.fetch(&Request::navigate(origin())).await.unwrap();
        assert_eq!(root.body.as_ref(), b"<html>root</html>");
    }
}
