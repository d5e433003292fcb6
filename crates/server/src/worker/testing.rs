//! Stub fetchers for worker and tool tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use larder_client::{Fetcher, Request, Response, StatusCode, header};
use larder_core::{CacheDb, Error};
use url::Url;

pub(crate) const ORIGIN: &str = "https://app.test/";

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Serves canned responses by URL; unknown URLs fail like a dead network.
#[derive(Default)]
pub(crate) struct StubFetcher {
    routes: Mutex<HashMap<String, (StatusCode, String)>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn route(&self, path: &str, body: &str) {
        self.route_status(path, StatusCode::OK, body);
    }

    pub(crate) fn route_status(&self, path: &str, status: StatusCode, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), (status, body.to_string()));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let route = self.routes.lock().unwrap().get(request.url().as_str()).cloned();
        match route {
            Some((status, body)) => {
                let mut headers = header::HeaderMap::new();
                headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/html"));
                Ok(Response::new(status, headers, body))
            }
            None => Err(Error::HttpError(format!("connection refused: {}", request.url()))),
        }
    }
}

/// A network that never answers.
pub(crate) struct PendingFetcher;

#[async_trait]
impl Fetcher for PendingFetcher {
    async fn fetch(&self, _request: &Request) -> Result<Response, Error> {
        std::future::pending().await
    }
}

/// A network that is always down.
pub(crate) struct OfflineFetcher;

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        Err(Error::HttpError(format!("network unreachable: {}", request.url())))
    }
}

/// Store `body` for `path` in the named generation.
pub(crate) async fn seed(store: &CacheDb, generation: &str, path: &str, body: &str) {
    let request = Request::get(url(path));
    let stored = Response::ok("text/html", body.to_string()).into_stored(request.url());
    store
        .open_generation(generation)
        .await
        .unwrap()
        .put(&request.key(), &stored)
        .await
        .unwrap();
}

/// Body of whatever the store holds for `path`, in any generation.
pub(crate) async fn stored_body(store: &CacheDb, path: &str) -> Option<String> {
    store
        .match_any(&Request::get(url(path)).key())
        .await
        .unwrap()
        .map(|stored| String::from_utf8(stored.body).unwrap())
}
