//! Test doubles for the tool handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use offline_core::{AppConfig, CacheDb, Network, NetworkError, Request, Response};

use crate::state::ServerState;

/// Serves fixed bodies by path; everything else is a 404.
pub struct StubNetwork {
    bodies: Mutex<HashMap<String, String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl StubNetwork {
    pub fn new() -> Self {
        let bodies = [
            ("/", "<html>root</html>"),
            ("/manifest.json", r#"{"name":"Gastos"}"#),
            ("/icons/icon-192.png", "png-192"),
            ("/icons/icon-512.png", "png-512"),
            ("/app.js", "console.log(1)"),
        ]
        .into_iter()
        .map(|(path, body)| (path.to_string(), body.to_string()))
        .collect();

        Self { bodies: Mutex::new(bodies), offline: AtomicBool::new(false), calls: AtomicUsize::new(0) }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn remove(&self, path: &str) {
        self.bodies.lock().unwrap().remove(path);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Unreachable("offline".into()));
        }

        let body = self.bodies.lock().unwrap().get(request.url().path()).cloned();
        Ok(match body {
            Some(body) => Response::new(200, request.url().as_str(), body).with_header("content-type", "text/plain"),
            None => Response::new(404, request.url().as_str(), "not found"),
        })
    }
}

pub fn test_config(skip_waiting: bool) -> AppConfig {
    AppConfig { origin: "https://gastos.test/".into(), skip_waiting, ..AppConfig::default() }
}

pub async fn test_state(skip_waiting: bool) -> ServerState {
    test_state_with(skip_waiting, Arc::new(StubNetwork::new())).await
}

pub async fn test_state_with(skip_waiting: bool, network: Arc<StubNetwork>) -> ServerState {
    let store = Arc::new(CacheDb::open_in_memory().await.unwrap());
    ServerState::new(&test_config(skip_waiting), store, network).unwrap()
}
