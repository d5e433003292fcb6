//! cache_lookup tool implementation.
//!
//! Reads the stored response for a URL without touching the network.

use larder_client::resolve;
use larder_core::{CacheDb, Error, RequestKey};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Parameters for the cache_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheLookupParams {
    /// URL or origin-relative path of the stored request.
    pub url: String,
}

/// Output from the cache_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheLookupOutput {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub stored_at: String,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
}

/// Implementation of the cache_lookup tool.
pub async fn lookup_impl(cache: &CacheDb, origin: &Url, params: CacheLookupParams) -> Result<CallToolResult, McpError> {
    let url = resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let stored = cache
        .match_any(&RequestKey::for_url(url.as_str()))
        .await?
        .ok_or_else(|| Error::CacheMiss(url.to_string()))?;

    let output = CacheLookupOutput {
        url: stored.url,
        status: stored.status,
        status_text: stored.status_text,
        content_type: stored.content_type,
        headers: stored.headers,
        stored_at: stored.stored_at,
        body: String::from_utf8_lossy(&stored.body).into_owned(),
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
