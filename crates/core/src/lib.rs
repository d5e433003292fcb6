//! Core types and shared functionality for larder.
//!
//! This crate provides:
//! - The versioned response store with SQLite backend
//! - Version tags and generation naming
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod store;
pub mod version;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use store::{CacheDb, Generation, GenerationStat, RequestKey, StoredResponse};
pub use version::{CacheVersion, Namespace};
