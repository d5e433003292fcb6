//! Store inspection tools.

pub mod generations;
pub mod lookup;

pub use generations::generations_impl;
pub use lookup::{CacheLookupParams, lookup_impl};
