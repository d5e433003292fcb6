//! Request interception.
//!
//! For every GET request the store lookup and the network fetch start
//! together. A store hit is returned at once; a miss waits for the network.
//! Whatever the network returns is written into the current version's
//! `pages` generation in the background, so hits are refreshed on every
//! request (stale-while-revalidate). When neither side can answer the caller
//! gets the fixed 503 fallback.

use std::sync::Arc;

use larder_client::{Fetcher, Request, Response};
use larder_core::{CacheDb, CacheVersion, Error, Namespace, RequestKey};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

/// Where a response handed to the caller came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Fallback => "fallback",
        }
    }
}

/// Outcome of intercepting one request.
#[derive(Debug)]
pub enum Interception {
    /// Not ours to handle; the host's default handling applies.
    Passthrough(Request),
    /// The proxy answered.
    Respond(Responded),
}

/// A response supplied by the proxy.
#[derive(Debug)]
pub struct Responded {
    pub response: Response,
    pub source: ResponseSource,
    /// The network fetch and store write behind this response.
    pub revalidation: Revalidation,
}

/// Background network fetch and store population of one request.
///
/// Dropping the handle detaches the task; it still runs to completion.
#[derive(Debug)]
pub struct Revalidation(JoinHandle<()>);

impl Revalidation {
    /// Wait until the fetch, and the store write that follows a successful
    /// fetch, have finished.
    pub async fn settled(self) {
        if let Err(e) = self.0.await {
            tracing::warn!(error = %e, "revalidation task failed");
        }
    }
}

/// Serves GET requests from the store while refreshing it from the network.
#[derive(Clone)]
pub struct Interceptor {
    store: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    version: CacheVersion,
}

impl Interceptor {
    pub fn new(store: CacheDb, fetcher: Arc<dyn Fetcher>, version: CacheVersion) -> Self {
        Self { store, fetcher, version }
    }

    /// Decide how to answer `request`.
    pub async fn intercept(&self, request: Request) -> Interception {
        if !request.is_cacheable() {
            tracing::debug!(method = %request.method(), url = %request.url(), "fetch event ignored");
            return Interception::Passthrough(request);
        }

        let key = request.key();
        let url = request.url().clone();

        let (network_tx, network_rx) = oneshot::channel();
        let revalidation = Revalidation(tokio::spawn(revalidate(
            self.store.clone(),
            Arc::clone(&self.fetcher),
            self.version.generation(Namespace::Pages),
            request,
            network_tx,
        )));

        if let Some(response) = self.lookup(&key, &url).await {
            tracing::debug!(url = %url, source = "cache", "fetch event");
            return Interception::Respond(Responded { response, source: ResponseSource::Cache, revalidation });
        }

        let (response, source) = match network_rx.await {
            Ok(Ok(response)) => {
                tracing::debug!(url = %url, source = "network", "fetch event");
                (response, ResponseSource::Network)
            }
            Ok(Err(e)) => {
                tracing::info!(url = %url, error = %e, "fetch request failed in both cache and network");
                (Response::service_unavailable(), ResponseSource::Fallback)
            }
            Err(_) => {
                tracing::warn!(url = %url, "network task ended without an outcome");
                (Response::service_unavailable(), ResponseSource::Fallback)
            }
        };

        Interception::Respond(Responded { response, source, revalidation })
    }

    /// Store lookup across all generations. Failures count as misses.
    async fn lookup(&self, key: &RequestKey, url: &Url) -> Option<Response> {
        match self.store.match_any(key).await {
            Ok(Some(stored)) => match Response::from_stored(stored) {
                Ok(response) => Some(response),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "ignoring unreadable store entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "store lookup failed");
                None
            }
        }
    }
}

/// Network half of an interception: fetch, report the outcome, then persist
/// a copy of a successful response.
async fn revalidate(
    store: CacheDb, fetcher: Arc<dyn Fetcher>, generation: String, request: Request,
    outcome: oneshot::Sender<Result<Response, Error>>,
) {
    let response = match fetcher.fetch(&request).await {
        Ok(response) => response,
        Err(e) => {
            let _ = outcome.send(Err(e));
            return;
        }
    };

    let copy = response.replay_copy();
    // The receiver is gone when the caller was already served from the store.
    let _ = outcome.send(Ok(response));

    match populate(&store, &generation, &request, copy).await {
        Ok(()) => tracing::debug!(url = %request.url(), generation = %generation, "fetch response stored"),
        Err(e) => {
            tracing::warn!(url = %request.url(), generation = %generation, error = %e, "failed to store fetch response")
        }
    }
}

async fn populate(store: &CacheDb, generation: &str, request: &Request, response: Response) -> Result<(), Error> {
    let stored = response.into_stored(request.url());
    store.open_generation(generation).await?.put(&request.key(), &stored).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{OfflineFetcher, PendingFetcher, StubFetcher, seed, stored_body, url};
    use larder_client::{Method, StatusCode};
    use std::time::Duration;

    fn interceptor(store: &CacheDb, fetcher: Arc<dyn Fetcher>) -> Interceptor {
        Interceptor::new(store.clone(), fetcher, CacheVersion::default())
    }

    fn responded(interception: Interception) -> Responded {
        match interception {
            Interception::Respond(responded) => responded,
            Interception::Passthrough(request) => panic!("unexpected passthrough for {}", request.url()),
        }
    }

    #[tokio::test]
    async fn test_non_get_passes_through_untouched() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route("/form", "<p>ok</p>");
        let interceptor = interceptor(&store, fetcher.clone());

        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            let interception = interceptor.intercept(Request::new(method.clone(), url("/form"))).await;
            match interception {
                Interception::Passthrough(request) => assert_eq!(request.method(), &method),
                Interception::Respond(_) => panic!("{method} must not be intercepted"),
            }
        }

        assert_eq!(fetcher.calls(), 0);
        assert!(store.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hit_returns_without_waiting_for_network() {
        let store = CacheDb::open_in_memory().await.unwrap();
        seed(&store, "v1::fundamentals", "/index.html", "<h1>Offline home</h1>").await;
        let interceptor = interceptor(&store, Arc::new(PendingFetcher));

        let interception = tokio::time::timeout(Duration::from_secs(5), interceptor.intercept(Request::get(url("/index.html"))))
            .await
            .expect("cache hit must not wait for the network");

        let responded = responded(interception);
        assert_eq!(responded.source, ResponseSource::Cache);
        assert_eq!(responded.response.status(), StatusCode::OK);
        assert_eq!(responded.response.text(), "<h1>Offline home</h1>");
        assert_eq!(responded.response.content_type(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_hit_in_stale_generation_still_counts() {
        let store = CacheDb::open_in_memory().await.unwrap();
        seed(&store, "v0::pages", "/about", "old about").await;
        let interceptor = interceptor(&store, Arc::new(PendingFetcher));

        let responded = responded(interceptor.intercept(Request::get(url("/about"))).await);
        assert_eq!(responded.source, ResponseSource::Cache);
        assert_eq!(responded.response.text(), "old about");
    }

    #[tokio::test]
    async fn test_miss_then_network_success_populates_pages() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route("/articles/1", "<p>article one</p>");
        let interceptor = interceptor(&store, fetcher.clone());

        let responded = responded(interceptor.intercept(Request::get(url("/articles/1"))).await);
        assert_eq!(responded.source, ResponseSource::Network);
        assert_eq!(responded.response.text(), "<p>article one</p>");

        responded.revalidation.settled().await;

        assert_eq!(stored_body(&store, "/articles/1").await.as_deref(), Some("<p>article one</p>"));
        let pages = store.open_generation("v1::pages").await.unwrap();
        assert!(pages.get(&Request::get(url("/articles/1")).key()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_miss_and_network_failure_falls_back() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let interceptor = interceptor(&store, Arc::new(OfflineFetcher));

        let responded = responded(interceptor.intercept(Request::get(url("/articles/2"))).await);
        assert_eq!(responded.source, ResponseSource::Fallback);
        assert_eq!(responded.response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(responded.response.status_text(), "Service Unavailable");
        assert_eq!(responded.response.content_type(), Some("text/html"));
        assert_eq!(responded.response.text(), "<h1>Service Unavailable</h1>");

        responded.revalidation.settled().await;
        assert!(stored_body(&store, "/articles/2").await.is_none());
    }

    #[tokio::test]
    async fn test_refetch_overwrites_entry() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        let interceptor = interceptor(&store, fetcher.clone());

        fetcher.route("/news", "first edition");
        let first = responded(interceptor.intercept(Request::get(url("/news"))).await);
        assert_eq!(first.source, ResponseSource::Network);
        first.revalidation.settled().await;

        fetcher.route("/news", "second edition");
        let second = responded(interceptor.intercept(Request::get(url("/news"))).await);
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.response.text(), "first edition");
        second.revalidation.settled().await;

        assert_eq!(stored_body(&store, "/news").await.as_deref(), Some("second edition"));
        let pages = store.open_generation("v1::pages").await.unwrap();
        assert_eq!(pages.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_is_served_and_stored() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route_status("/missing", StatusCode::NOT_FOUND, "not here");
        let interceptor = interceptor(&store, fetcher);

        let responded = responded(interceptor.intercept(Request::get(url("/missing"))).await);
        assert_eq!(responded.source, ResponseSource::Network);
        assert_eq!(responded.response.status(), StatusCode::NOT_FOUND);
        responded.revalidation.settled().await;

        assert_eq!(stored_body(&store, "/missing").await.as_deref(), Some("not here"));
    }

    #[tokio::test]
    async fn test_store_failure_is_invisible_to_caller() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route("/live", "straight from the wire");
        let interceptor = interceptor(&store, fetcher);
        store.close().await.unwrap();

        let responded = responded(interceptor.intercept(Request::get(url("/live"))).await);
        assert_eq!(responded.source, ResponseSource::Network);
        assert_eq!(responded.response.text(), "straight from the wire");

        responded.revalidation.settled().await;
    }

    #[tokio::test]
    async fn test_detached_revalidation_still_stores() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route("/detached", "eventually stored");
        let interceptor = interceptor(&store, fetcher);

        let Responded { revalidation, .. } = responded(interceptor.intercept(Request::get(url("/detached"))).await);
        drop(revalidation);

        for _ in 0..50 {
            if stored_body(&store, "/detached").await.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("background write never landed");
    }
}
