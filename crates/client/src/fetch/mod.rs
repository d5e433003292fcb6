//! Network fetch primitive.
//!
//! The proxy only needs one thing from the network: turn a [`Request`] into
//! a [`Response`] or an error. [`Fetcher`] is that seam; [`HttpFetcher`] is
//! the reqwest-backed implementation used in production.
//!
//! ### What counts as success
//! - Any HTTP response, whatever its status, is a successful fetch
//! - Transport errors, timeouts and oversized bodies are failures
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod location;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use location::{UrlError, resolve};

use crate::message::{Request, Response};
use larder_core::{AppConfig, Error};

/// Something that can perform a network request.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "larder/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "larder/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP fetcher backed by reqwest.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let url = request.url();

        let response = self
            .http
            .request(request.method().clone(), url.as_str())
            .headers(request.headers().clone())
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let headers = response.headers().clone();

        let bytes = response.bytes().await.map_err(|e| classify(url, e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        tracing::debug!(
            method = %request.method(),
            url = %url,
            status = status.as_u16(),
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or(""),
            "fetched from network"
        );

        Ok(Response::new(status, headers, bytes))
    }
}

fn classify(url: &url::Url, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::HttpError(format!("network error for {url}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "larder/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "custom/2.0".into(), timeout_ms: 1500, max_bytes: 1024, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "custom/2.0");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.max_redirects, 5);
    }

    #[tokio::test]
    async fn test_http_fetcher_new() {
        let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
        assert_eq!(fetcher.config().user_agent, "larder/0.1");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        let config = FetchConfig { timeout: Duration::from_millis(500), ..Default::default() };
        let fetcher = HttpFetcher::new(config).unwrap();
        let request = Request::get(url::Url::parse("http://127.0.0.1:9/").unwrap());

        let result = fetcher.fetch(&request).await;
        assert!(matches!(result, Err(Error::HttpError(_)) | Err(Error::FetchTimeout(_))));
    }
}
