//! Network side of larder.
//!
//! This crate provides the request/response value types the proxy passes
//! around, the `Fetcher` network primitive with its reqwest-backed
//! implementation, and URL resolution for request identities.

pub mod fetch;
pub mod message;

pub use fetch::{FetchConfig, Fetcher, HttpFetcher, UrlError, resolve};
pub use message::{Request, Response};

pub use reqwest::{Method, StatusCode, header};
