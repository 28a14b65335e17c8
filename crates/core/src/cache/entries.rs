//! [`CacheStore`] implementation for the SQLite-backed [`CacheDb`].

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::{CacheHandle, CacheStore};
use crate::Error;
use crate::request::{Namespace, RequestKey, Response, ResponseKind};

/// Insert or replace one entry. `seq` always moves forward so key listings
/// reflect write order.
fn upsert_entry(
    conn: &rusqlite::Connection, namespace: &str, key: &RequestKey, response: &Response, stored_at: &str,
) -> Result<(), Error> {
    let headers_json =
        serde_json::to_string(&response.headers).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
    conn.execute(
        "INSERT INTO entries (
            namespace, key_hash, method, url, status, final_url, headers_json, body, stored_at, seq
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                  (SELECT COALESCE(MAX(seq), 0) + 1 FROM entries))
        ON CONFLICT(namespace, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            final_url = excluded.final_url,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at,
            seq = excluded.seq",
        params![
            namespace,
            key.hash(),
            &key.method,
            &key.url,
            response.status as i64,
            &response.url,
            headers_json,
            response.body.as_ref(),
            stored_at,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, namespace: &Namespace) -> Result<CacheHandle, Error> {
        let name = namespace.as_str().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO namespaces (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;
        Ok(CacheHandle::new(namespace.clone()))
    }

    async fn get(&self, handle: &CacheHandle, key: &RequestKey) -> Result<Option<Response>, Error> {
        let namespace = handle.namespace().as_str().to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, final_url, headers_json, body
                     FROM entries WHERE namespace = ?1 AND key_hash = ?2",
                )?;

                let row = stmt.query_row(params![namespace, key_hash], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                });

                let (status, url, headers_json, body) = match row {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let status = u16::try_from(status)
                    .map_err(|_| Error::StoreUnavailable(format!("corrupt status {status}")))?;
                let headers: Vec<(String, String)> =
                    serde_json::from_str(&headers_json).map_err(|e| Error::StoreUnavailable(e.to_string()))?;

                Ok(Some(Response { status, url, headers, body: body.into(), kind: ResponseKind::Basic }))
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, handle: &CacheHandle, key: &RequestKey, response: Response) -> Result<(), Error> {
        let namespace = handle.namespace().as_str().to_string();
        let key = key.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| upsert_entry(conn, &namespace, &key, &response, &stored_at))
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, handle: &CacheHandle, entries: Vec<(RequestKey, Response)>) -> Result<(), Error> {
        let namespace = handle.namespace().as_str().to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for (key, response) in &entries {
                    upsert_entry(&tx, &namespace, key, response, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, handle: &CacheHandle) -> Result<Vec<RequestKey>, Error> {
        let namespace = handle.namespace().as_str().to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE namespace = ?1 ORDER BY seq ASC")?;
                let keys = stmt
                    .query_map(params![namespace], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn namespaces(&self) -> Result<BTreeSet<Namespace>, Error> {
        self.conn
            .call(|conn| -> Result<BTreeSet<Namespace>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .map(|name| name.map(Namespace::from_stored))
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, namespace: &Namespace) -> Result<bool, Error> {
        let name = namespace.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE namespace = ?1", params![name])?;
                let removed = tx.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(removed > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        RequestKey::new("GET", &Url::parse("https://app.test").unwrap().join(path).unwrap())
    }

    fn response(body: &str) -> Response {
        Response::new(200, "https://app.test/", body.to_string()).with_header("content-type", "text/plain")
    }

    fn ns(id: &str) -> Namespace {
        Namespace::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let handle = db.open(&ns("v1")).await.unwrap();

        db.put(&handle, &key("/app.js"), response("console.log(1)")).await.unwrap();

        let cached = db.get(&handle, &key("/app.js")).await.unwrap().unwrap();
        assert_eq!(cached, response("console.log(1)"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let handle = db.open(&ns("v1")).await.unwrap();
        assert!(db.get(&handle, &key("/nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_is_exact_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let handle = db.open(&ns("v1")).await.unwrap();
        db.put(&handle, &key("/app"), response("a")).await.unwrap();

        assert!(db.get(&handle, &key("/app/")).await.unwrap().is_none());
        assert!(db.get(&handle, &key("/ap")).await.unwrap().is_none());
        let head = RequestKey { method: "HEAD".into(), url: key("/app").url };
        assert!(db.get(&handle, &head).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let handle = db.open(&ns("v1")).await.unwrap();

        db.put(&handle, &key("/a"), response("old")).await.unwrap();
        db.put(&handle, &key("/b"), response("b")).await.unwrap();
        db.put(&handle, &key("/a"), response("new")).await.unwrap();

        let cached = db.get(&handle, &key("/a")).await.unwrap().unwrap();
        assert_eq!(cached.body.as_ref(), b"new");
        assert_eq!(db.keys(&handle).await.unwrap(), vec![key("/b"), key("/a")]);
    }

    #[tokio::test]
    async fn test_open_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let handle = db.open(&ns("v1")).await.unwrap();
        db.put(&handle, &key("/a"), response("a")).await.unwrap();

        let again = db.open(&ns("v1")).await.unwrap();
        assert_eq!(handle, again);
        assert_eq!(db.keys(&again).await.unwrap().len(), 1);
        assert_eq!(db.namespaces().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v1 = db.open(&ns("v1")).await.unwrap();
        let v2 = db.open(&ns("v2")).await.unwrap();

        db.put(&v1, &key("/a"), response("from v1")).await.unwrap();

        assert!(db.get(&v2, &key("/a")).await.unwrap().is_none());
        assert!(db.get(&v1, &key("/a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_namespace() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v1 = db.open(&ns("v1")).await.unwrap();
        let v2 = db.open(&ns("v2")).await.unwrap();
        db.put(&v1, &key("/a"), response("a")).await.unwrap();
        db.put(&v2, &key("/a"), response("a")).await.unwrap();

        assert!(db.delete(&ns("v1")).await.unwrap());
        assert!(!db.delete(&ns("v1")).await.unwrap());

        let remaining = db.namespaces().await.unwrap();
        assert_eq!(remaining, BTreeSet::from([ns("v2")]));
        assert!(db.keys(&v1).await.unwrap().is_empty());
        assert_eq!(db.keys(&v2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_into_deleted_namespace_fails() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v1 = db.open(&ns("v1")).await.unwrap();
        db.delete(&ns("v1")).await.unwrap();

        assert!(db.put(&v1, &key("/a"), response("a")).await.is_err());
        assert!(db.namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_all_is_atomic() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v1 = db.open(&ns("v1")).await.unwrap();
        db.delete(&ns("v1")).await.unwrap();

        let batch = vec![(key("/"), response("root")), (key("/manifest.json"), response("{}"))];
        assert!(db.put_all(&v1, batch.clone()).await.is_err());

        let v1 = db.open(&ns("v1")).await.unwrap();
        assert!(db.keys(&v1).await.unwrap().is_empty());

        db.put_all(&v1, batch).await.unwrap();
        assert_eq!(db.keys(&v1).await.unwrap(), vec![key("/"), key("/manifest.json")]);
    }

    #[tokio::test]
    async fn test_headers_round_trip_in_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v1 = db.open(&ns("v1")).await.unwrap();
        let resp = Response::new(404, "https://app.test/x", bytes::Bytes::new())
            .with_header("set-cookie", "a=1")
            .with_header("set-cookie", "b=2");

        db.put(&v1, &key("/x"), resp.clone()).await.unwrap();
        assert_eq!(db.get(&v1, &key("/x")).await.unwrap(), Some(resp));
    }
}
