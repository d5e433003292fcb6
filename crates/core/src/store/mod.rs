//! SQLite-backed versioned response store.
//!
//! Entries map a request identity to a stored response and live in exactly
//! one named generation. Generations are created on first open and removed
//! as a whole; entries inside them are replaced wholesale on re-write.
//!
//! - Request identities are SHA-256 digests of canonical URLs
//! - Bulk writes are committed in a single transaction
//! - Lookups can target one generation or scan all of them
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod key;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{Generation, StoredResponse};
pub use generations::GenerationStat;
pub use key::RequestKey;
