//! Versioned response store.
//!
//! Entries are partitioned by [`Namespace`]; a namespace is created on first
//! [`CacheStore::open`] and removed wholesale by [`CacheStore::delete`]. The
//! SQLite implementation lives in [`CacheDb`]:
//!
//! - Request-addressed keys using SHA-256 over method and URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Transactional batch writes for install staging

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;

use std::collections::BTreeSet;

use async_trait::async_trait;

pub use crate::Error;
use crate::request::{Namespace, RequestKey, Response};

pub use connection::CacheDb;

/// Proof that a namespace has been opened in a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHandle {
    namespace: Namespace,
}

impl CacheHandle {
    pub(crate) fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

/// Key-value response store namespaced by cache version.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the namespace if absent. Idempotent.
    async fn open(&self, namespace: &Namespace) -> Result<CacheHandle, Error>;

    /// Exact lookup by method and URL.
    async fn get(&self, handle: &CacheHandle, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Store `response` under `key`, replacing any previous value.
    async fn put(&self, handle: &CacheHandle, key: &RequestKey, response: Response) -> Result<(), Error>;

    /// Store a batch of entries in one transaction; either all land or none do.
    async fn put_all(&self, handle: &CacheHandle, entries: Vec<(RequestKey, Response)>) -> Result<(), Error>;

    /// Keys in the namespace, oldest write first.
    async fn keys(&self, handle: &CacheHandle) -> Result<Vec<RequestKey>, Error>;

    /// Every namespace currently present.
    async fn namespaces(&self) -> Result<BTreeSet<Namespace>, Error>;

    /// Drop a namespace and all of its entries. Returns false if it did not exist.
    async fn delete(&self, namespace: &Namespace) -> Result<bool, Error>;
}
