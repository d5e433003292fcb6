//! The offline worker: install-time bootstrap, per-request interception and
//! activation-time reaping, tied together by [`Worker`].

pub mod bootstrap;
pub mod intercept;
pub mod lifecycle;
pub mod reap;

#[cfg(test)]
pub(crate) mod testing;

pub use intercept::Interception;
pub use lifecycle::Worker;
