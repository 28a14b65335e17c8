//! Strategy executors, one per [`RoutingDecision`](crate::routing::RoutingDecision).

use std::sync::{Arc, PoisonError};

use super::OfflineWorker;
use crate::Error;
use crate::request::{Request, RequestKey, Response};

impl OfflineWorker {
    /// Network, then the exact cached entry, then (navigations only) the cached
    /// root document, then the generic error response.
    pub(super) async fn network_first(&self, request: &Request) -> Result<Response, Error> {
        let key = request.key();
        let err = match self.network.fetch(request).await {
            Ok(response) => {
                self.schedule_put(key, response.clone());
                return Ok(response);
            }
            Err(err) => err,
        };

        tracing::debug!(url = %request.url(), error = %err, "network failed; trying cache");

        if let Some(cached) = self.lookup(&key).await {
            return Ok(cached);
        }

        if request.is_navigation() {
            let root = Request::get(self.config.root_url()).key();
            if let Some(cached) = self.lookup(&root).await {
                tracing::debug!(url = %request.url(), "serving cached root document");
                return Ok(cached);
            }
        }

        Ok(Response::error())
    }

    /// Cached entry if present, with zero network calls. Otherwise fetch,
    /// refill in the background and return the fresh response.
    pub(super) async fn cache_first(&self, request: &Request) -> Result<Response, Error> {
        let key = request.key();
        if let Some(cached) = self.lookup(&key).await {
            tracing::debug!(url = %request.url(), "cache hit");
            return Ok(cached);
        }

        let response = self.network.fetch(request).await?;
        self.schedule_put(key, response.clone());
        Ok(response)
    }

    /// Forward untouched. The store is never read or written.
    pub(super) async fn pass_through(&self, request: &Request) -> Result<Response, Error> {
        Ok(self.network.fetch(request).await?)
    }

    /// Store read; any store failure counts as a miss.
    pub(super) async fn lookup(&self, key: &RequestKey) -> Option<Response> {
        let handle = self.handle.get()?;
        match self.store.get(handle, key).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Write a copy of `response` without holding up the caller. Failures are
    /// logged and dropped.
    fn schedule_put(&self, key: RequestKey, response: Response) {
        let Some(handle) = self.handle.get().cloned() else {
            return;
        };
        let store = Arc::clone(&self.store);

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            match store.put(&handle, &key, response).await {
                Ok(()) => tracing::debug!(key = %key, "cached response"),
                Err(err) => tracing::warn!(key = %key, error = %err, "cache write dropped"),
            }
        });
    }
}
