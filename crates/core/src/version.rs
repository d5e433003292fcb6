//! Version tags and generation naming.
//!
//! A generation name is `<token><separator><namespace>`, e.g. `v1::pages`.
//! Everything whose name starts with `<token><separator>` belongs to the
//! running version; everything else is stale and gets reaped on activation.

use std::fmt;

/// Well-known generation namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Resources pre-populated from the manifest at install time.
    Fundamentals,
    /// Responses captured from the network while intercepting.
    Pages,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Fundamentals => "fundamentals",
            Namespace::Pages => "pages",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The version tag of the running worker.
///
/// Injected into every component that names or matches generations, so
/// several versions can coexist in one process (and one test).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVersion {
    token: String,
    separator: String,
}

impl CacheVersion {
    pub fn new(token: impl Into<String>, separator: impl Into<String>) -> Self {
        Self { token: token.into(), separator: separator.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// The prefix shared by every generation of this version.
    pub fn prefix(&self) -> String {
        format!("{}{}", self.token, self.separator)
    }

    /// Full generation name for a namespace of this version.
    pub fn generation(&self, namespace: Namespace) -> String {
        format!("{}{}", self.prefix(), namespace)
    }

    /// Whether a generation belongs to this version.
    ///
    /// Matching is by prefix only; unknown namespaces of the current
    /// version are still owned.
    pub fn owns(&self, generation: &str) -> bool {
        generation.starts_with(&self.prefix())
    }
}

impl Default for CacheVersion {
    fn default() -> Self {
        Self::new("v1", "::")
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}
