//! proxy_fetch tool implementation.
//!
//! Dispatches a fetch event to the worker. Requests the worker does not
//! intercept are sent straight to the network, as the host would.

use std::collections::BTreeMap;

use larder_client::{Fetcher, Method, Request, header, resolve};
use larder_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::worker::{Interception, Worker};

/// Input parameters for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchParams {
    /// URL or origin-relative path to request.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests go through the cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Wait until the background refresh has been written to the store
    /// before answering.
    #[serde(default)]
    pub wait_for_revalidation: bool,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchOutput {
    /// The resolved request URL.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    /// One of "cache", "network", "fallback" or "passthrough".
    pub source: String,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
}

/// Implementation of the proxy_fetch tool.
pub async fn proxy_fetch_impl(
    worker: &Worker, fetcher: &dyn Fetcher, origin: &Url, params: ProxyFetchParams,
) -> Result<CallToolResult, McpError> {
    let url = resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("invalid method: {}", params.method)))?;
    let headers = build_headers(&params.headers)?;

    let request = Request::new(method, url.clone()).with_headers(headers);

    let (response, source) = match worker.handle_fetch(request).await {
        Interception::Respond(responded) => {
            if params.wait_for_revalidation {
                responded.revalidation.settled().await;
            }
            (responded.response, responded.source.as_str())
        }
        Interception::Passthrough(request) => (fetcher.fetch(&request).await?, "passthrough"),
    };

    let output = ProxyFetchOutput {
        url: url.to_string(),
        status: response.status().as_u16(),
        status_text: response.status_text().to_string(),
        content_type: response.content_type().map(str::to_string),
        source: source.to_string(),
        body: response.text(),
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn build_headers(raw: &BTreeMap<String, String>) -> Result<header::HeaderMap, Error> {
    let mut headers = header::HeaderMap::with_capacity(raw.len());
    for (name, value) in raw {
        let name = header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid header name {name:?}: {e}")))?;
        let value = header::HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidInput(format!("invalid value for header {name}: {e}")))?;
        headers.append(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{ORIGIN, StubFetcher, url};
    use larder_core::{CacheDb, CacheVersion};
    use std::sync::Arc;

    async fn active_worker(fetcher: Arc<StubFetcher>) -> Worker {
        let store = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(store, fetcher, CacheVersion::default(), vec![url("/index.html")]);
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        worker
    }

    fn params(url: &str, method: &str) -> ProxyFetchParams {
        ProxyFetchParams {
            url: url.into(),
            method: method.into(),
            headers: BTreeMap::new(),
            wait_for_revalidation: false,
        }
    }

    fn output(result: CallToolResult) -> ProxyFetchOutput {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_proxy_fetch_serves_cached_manifest() {
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route("/index.html", "<h1>Home</h1>");
        let worker = active_worker(fetcher.clone()).await;
        let origin = Url::parse(ORIGIN).unwrap();

        let result = proxy_fetch_impl(&worker, fetcher.as_ref(), &origin, params("/index.html", "get"))
            .await
            .unwrap();

        let output = output(result);
        assert_eq!(output.source, "cache");
        assert_eq!(output.status, 200);
        assert_eq!(output.body, "<h1>Home</h1>");
    }

    #[tokio::test]
    async fn test_proxy_fetch_fallback() {
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route("/index.html", "<h1>Home</h1>");
        let worker = active_worker(fetcher.clone()).await;
        let origin = Url::parse(ORIGIN).unwrap();

        let result = proxy_fetch_impl(&worker, fetcher.as_ref(), &origin, params("/offline", "GET"))
            .await
            .unwrap();

        let output = output(result);
        assert_eq!(output.source, "fallback");
        assert_eq!(output.status, 503);
        assert_eq!(output.status_text, "Service Unavailable");
        assert_eq!(output.content_type.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_proxy_fetch_post_passes_through() {
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route("/index.html", "<h1>Home</h1>");
        fetcher.route("/submit", "<p>thanks</p>");
        let worker = active_worker(fetcher.clone()).await;
        let origin = Url::parse(ORIGIN).unwrap();

        let result = proxy_fetch_impl(&worker, fetcher.as_ref(), &origin, params("/submit", "POST"))
            .await
            .unwrap();

        let output = output(result);
        assert_eq!(output.source, "passthrough");
        assert_eq!(output.body, "<p>thanks</p>");
    }

    #[tokio::test]
    async fn test_proxy_fetch_waits_for_revalidation() {
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route("/index.html", "<h1>Home</h1>");
        fetcher.route("/fresh", "<p>fresh</p>");
        let store = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(store.clone(), fetcher.clone(), CacheVersion::default(), vec![url("/index.html")]);
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        let origin = Url::parse(ORIGIN).unwrap();

        let params = ProxyFetchParams { wait_for_revalidation: true, ..params("/fresh", "GET") };
        let output = output(proxy_fetch_impl(&worker, fetcher.as_ref(), &origin, params).await.unwrap());
        assert_eq!(output.source, "network");

        let generation = store.open_generation("v1::pages").await.unwrap();
        assert_eq!(generation.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_proxy_fetch_redundant_worker_passes_through() {
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route("/about", "<p>about</p>");
        let store = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(store.clone(), fetcher.clone(), CacheVersion::default(), vec![url("/index.html")]);
        assert!(worker.install().await.is_err());
        let origin = Url::parse(ORIGIN).unwrap();

        let output = output(proxy_fetch_impl(&worker, fetcher.as_ref(), &origin, params("/about", "GET")).await.unwrap());

        assert_eq!(output.source, "passthrough");
        assert_eq!(output.body, "<p>about</p>");
        assert_eq!(store.list_generations().await.unwrap(), vec!["v1::fundamentals"]);
    }

    #[tokio::test]
    async fn test_proxy_fetch_invalid_method() {
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.route("/index.html", "<h1>Home</h1>");
        let worker = active_worker(fetcher.clone()).await;
        let origin = Url::parse(ORIGIN).unwrap();

        let result = proxy_fetch_impl(&worker, fetcher.as_ref(), &origin, params("/index.html", "GE T")).await;
        assert_eq!(result.unwrap_err().code.0, -32602);
    }

    #[test]
    fn test_build_headers_rejects_bad_name() {
        let mut raw = BTreeMap::new();
        raw.insert("bad header".to_string(), "x".to_string());
        assert!(matches!(build_headers(&raw), Err(Error::InvalidInput(_))));
    }
}
