//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LARDER_*)
//! 2. TOML config file (if LARDER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::version::CacheVersion;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LARDER_*)
/// 2. TOML config file (if LARDER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite store.
    ///
    /// Set via LARDER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Version token of the deployed resources.
    ///
    /// Bump it whenever the manifest or the resources behind it change;
    /// generations of any other version are reaped on activation.
    /// Set via LARDER_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Separator between version token and namespace in generation names.
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Origin that relative request identities resolve against.
    ///
    /// Set via LARDER_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Resources pre-populated at install, in order.
    ///
    /// Set in the TOML file or as `LARDER_MANIFEST='["/index.html"]'`.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body size accepted from the network.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./larder-store.sqlite")
}

fn default_version() -> String {
    "v1".into()
}

fn default_separator() -> String {
    "::".into()
}

fn default_origin() -> String {
    "http://127.0.0.1:5000/".into()
}

fn default_manifest() -> Vec<String> {
    vec!["/index.html".into(), "/js/style.css".into(), "/js/scripts.js".into()]
}

fn default_user_agent() -> String {
    "larder/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            version: default_version(),
            separator: default_separator(),
            origin: default_origin(),
            manifest: default_manifest(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The version tag handed to the worker components.
    pub fn cache_version(&self) -> CacheVersion {
        CacheVersion::new(self.version.clone(), self.separator.clone())
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Manifest entries resolved against the origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin or any entry fails to parse.
    pub fn manifest_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let origin = self.origin_url()?;
        self.manifest
            .iter()
            .map(|entry| {
                let mut url = origin.join(entry.trim()).map_err(|e| ConfigError::Invalid {
                    field: "manifest".into(),
                    reason: format!("{entry}: {e}"),
                })?;
                url.set_fragment(None);
                Ok(url)
            })
            .collect()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LARDER_`
    /// 2. TOML file from `LARDER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LARDER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LARDER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
