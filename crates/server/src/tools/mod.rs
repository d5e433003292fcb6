//! MCP tool implementations.
//!
//! This module contains all tools exposed by the larder server.

pub mod cache;
pub mod proxy_fetch;

pub use proxy_fetch::ProxyFetchParams;
