//! Request and response values exchanged between host, proxy and network.

use bytes::Bytes;
use larder_core::{Error, RequestKey, StoredResponse};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use url::Url;

const FALLBACK_BODY: &str = "<h1>Service Unavailable</h1>";

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    url: Url,
    method: Method,
    headers: HeaderMap,
}

impl Request {
    /// Build a request. The fragment never takes part in identity and is dropped.
    pub fn new(method: Method, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { url, method, headers: HeaderMap::new() }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Only GET requests are eligible for caching.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }

    /// Identity of this request in the store.
    pub fn key(&self) -> RequestKey {
        RequestKey::for_url(self.url.as_str())
    }
}

/// A response with a fully buffered body.
///
/// Deliberately not `Clone`: a response that is both returned and persisted
/// goes through [`Response::replay_copy`] first.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        Self { status, status_text, headers, body: body.into() }
    }

    /// Response with a `Content-Type` header and status 200.
    pub fn ok(content_type: &'static str, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self::new(StatusCode::OK, headers, body)
    }

    /// The fixed response served when neither store nor network can answer.
    pub fn service_unavailable() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            status_text: "Service Unavailable".to_string(),
            headers,
            body: Bytes::from_static(FALLBACK_BODY.as_bytes()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// An independent copy that can be consumed separately from `self`.
    pub fn replay_copy(&self) -> Self {
        Self {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            body: Bytes::copy_from_slice(&self.body),
        }
    }

    /// Persistable form of this response, recorded for `url`.
    pub fn into_stored(self, url: &Url) -> StoredResponse {
        let content_type = self.content_type().map(str::to_string);
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        StoredResponse {
            url: url.to_string(),
            status: self.status.as_u16(),
            status_text: self.status_text,
            headers,
            content_type,
            body: self.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild a response from a store entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::CorruptEntry` if the status or a header is invalid.
    pub fn from_stored(stored: StoredResponse) -> Result<Self, Error> {
        let status = StatusCode::from_u16(stored.status)
            .map_err(|e| Error::CorruptEntry(format!("status {}: {e}", stored.status)))?;

        let mut headers = HeaderMap::with_capacity(stored.headers.len());
        for (name, value) in &stored.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::CorruptEntry(format!("header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::CorruptEntry(format!("header value for {name}: {e}")))?;
            headers.append(name, value);
        }

        Ok(Self { status, status_text: stored.status_text, headers, body: Bytes::from(stored.body) })
    }
}
