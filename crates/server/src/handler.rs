//! MCP server handler implementation.
//!
//! The MCP server plays the host: it owns the worker and routes tool calls
//! to it as fetch events.
use std::sync::Arc;

use crate::tools::ProxyFetchParams;
use crate::tools::cache::{CacheLookupParams, generations_impl, lookup_impl};
use crate::tools::proxy_fetch::proxy_fetch_impl;
use crate::worker::Worker;

use larder_client::Fetcher;
use larder_core::{CacheDb, CacheVersion};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use url::Url;

/// The main MCP server handler for larder.
#[derive(Clone)]
pub struct LarderServer {
    tool_router: ToolRouter<Self>,
    worker: Arc<Worker>,
    store: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    origin: Url,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl LarderServer {
    /// Create a new server handler.
    pub fn new(worker: Arc<Worker>, store: CacheDb, fetcher: Arc<dyn Fetcher>, origin: Url) -> Self {
        Self { tool_router: Self::tool_router(), worker, store, fetcher, origin }
    }

    fn version(&self) -> &CacheVersion {
        self.worker.version()
    }

    /// Fetch a resource through the offline cache.
    ///
    /// GET requests are answered from the store when possible and refreshed
    /// from the network in the background; other methods go to the network.
    #[tool(
        description = "Fetch a URL through the offline cache. Returns status, source (cache, network, fallback, passthrough) and body."
    )]
    async fn proxy_fetch(&self, params: Parameters<ProxyFetchParams>) -> Result<CallToolResult, McpError> {
        proxy_fetch_impl(&self.worker, self.fetcher.as_ref(), &self.origin, params.0).await
    }

    #[tool(description = "Read the stored response for a URL without touching the network.")]
    async fn cache_lookup(&self, params: Parameters<CacheLookupParams>) -> Result<CallToolResult, McpError> {
        lookup_impl(&self.store, &self.origin, params.0).await
    }

    #[tool(description = "List store generations with entry counts and whether each belongs to the running version.")]
    async fn cache_generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.store, self.version()).await
    }
}

impl ServerHandler for LarderServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "larder".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
