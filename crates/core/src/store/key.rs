//! Request identity keys.

use sha2::{Digest, Sha256};
use std::fmt;

/// Opaque identity of a request inside the store.
///
/// Derived from the canonical URL only; method and headers do not take part
/// since only GET requests are ever stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    /// Compute the key for an already canonicalized URL.
    pub fn for_url(canonical_url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"GET\n");
        hasher.update(canonical_url.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap a key read back from the database.
    pub(crate) fn from_raw(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
