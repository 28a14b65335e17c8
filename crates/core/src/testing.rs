//! Test doubles for the network and store seams.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use url::Url;

use crate::Error;
use crate::cache::{CacheDb, CacheHandle, CacheStore};
use crate::network::{Network, NetworkError};
use crate::request::{Namespace, Request, RequestKey, Response};
use crate::worker::WorkerConfig;

pub fn origin() -> Url {
    Url::parse("https://gastos.test/").unwrap()
}

pub fn url(path: &str) -> Url {
    origin().join(path).unwrap()
}

pub fn worker_config(namespace: &str) -> WorkerConfig {
    WorkerConfig::new(Namespace::new(namespace).unwrap(), origin())
}

#[derive(Clone)]
enum Route {
    Respond { status: u16, body: String },
    Fail,
    Hang,
}

/// Scripted network keyed by URL path. Unknown paths answer 404.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, Route>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn serving_core_assets() -> Self {
        let network = Self::default();
        network.respond("/", 200, "<html>root</html>");
        network.respond("/manifest.json", 200, r#"{"name":"Gastos"}"#);
        network.respond("/icons/icon-192.png", 200, "png-192");
        network.respond("/icons/icon-512.png", 200, "png-512");
        network
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Route::Respond { status, body: body.to_string() });
    }

    pub fn fail(&self, path: &str) {
        self.routes.lock().unwrap().insert(path.to_string(), Route::Fail);
    }

    pub fn hang(&self, path: &str) {
        self.routes.lock().unwrap().insert(path.to_string(), Route::Hang);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.split_once(' ').map(|(_, p)| p) == Some(path))
            .count()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let path = request.url().path().to_string();
        self.calls.lock().unwrap().push(format!("{} {}", request.method(), path));

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Unreachable("offline".into()));
        }

        let route = self.routes.lock().unwrap().get(&path).cloned();
        match route {
            Some(Route::Respond { status, body }) => {
                Ok(Response::new(status, request.url().as_str(), body).with_header("content-type", "text/plain"))
            }
            Some(Route::Fail) => Err(NetworkError::Transport("connection reset".into())),
            Some(Route::Hang) => std::future::pending().await,
            None => Ok(Response::new(404, request.url().as_str(), "not found")),
        }
    }
}

/// SQLite store whose writes, deletes and reads can be held back or made to fail.
pub struct GatedStore {
    inner: CacheDb,
    gate_writes: AtomicBool,
    writes: Semaphore,
    gate_deletes: AtomicBool,
    deletes: Semaphore,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl GatedStore {
    pub async fn new() -> Self {
        Self {
            inner: CacheDb::open_in_memory().await.unwrap(),
            gate_writes: AtomicBool::new(false),
            writes: Semaphore::new(0),
            gate_deletes: AtomicBool::new(false),
            deletes: Semaphore::new(0),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Hold every single-entry write until [`release_writes`](Self::release_writes).
    pub fn gate_writes(&self) {
        self.gate_writes.store(true, Ordering::SeqCst);
    }

    pub fn release_writes(&self) {
        self.gate_writes.store(false, Ordering::SeqCst);
        self.writes.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub fn gate_deletes(&self) {
        self.gate_deletes.store(true, Ordering::SeqCst);
    }

    pub fn release_deletes(&self) {
        self.gate_deletes.store(false, Ordering::SeqCst);
        self.deletes.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for GatedStore {
    async fn open(&self, namespace: &Namespace) -> Result<CacheHandle, Error> {
        self.inner.open(namespace).await
    }

    async fn get(&self, handle: &CacheHandle, key: &RequestKey) -> Result<Option<Response>, Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("read failed".into()));
        }
        self.inner.get(handle, key).await
    }

    async fn put(&self, handle: &CacheHandle, key: &RequestKey, response: Response) -> Result<(), Error> {
        if self.gate_writes.load(Ordering::SeqCst) {
            let _permit = self.writes.acquire().await.map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("quota exceeded".into()));
        }
        self.inner.put(handle, key, response).await
    }

    async fn put_all(&self, handle: &CacheHandle, entries: Vec<(RequestKey, Response)>) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("quota exceeded".into()));
        }
        self.inner.put_all(handle, entries).await
    }

    async fn keys(&self, handle: &CacheHandle) -> Result<Vec<RequestKey>, Error> {
        self.inner.keys(handle).await
    }

    async fn namespaces(&self) -> Result<BTreeSet<Namespace>, Error> {
        self.inner.namespaces().await
    }

    async fn delete(&self, namespace: &Namespace) -> Result<bool, Error> {
        if self.gate_deletes.load(Ordering::SeqCst) {
            let _permit = self.deletes.acquire().await.map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        }
        self.inner.delete(namespace).await
    }
}
