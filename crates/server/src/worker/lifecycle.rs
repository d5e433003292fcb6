//! Host-facing lifecycle of the worker.
//!
//! The host dispatches three events: `install` once, `activate` once after a
//! successful install, and `fetch` per request. Only an activated worker
//! intercepts requests; before that, and after a failed install, every
//! request falls through to the host's default handling.

use std::sync::{Arc, Mutex, PoisonError};

use larder_client::{Fetcher, Request};
use larder_core::{CacheDb, CacheVersion, Error};
use url::Url;

use super::bootstrap::{Bootstrap, BootstrapReport};
use super::intercept::{Interception, Interceptor};
use super::reap::{ReapReport, Reaper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this worker never controls requests.
    Redundant,
}

pub struct Worker {
    version: CacheVersion,
    bootstrap: Bootstrap,
    reaper: Reaper,
    interceptor: Interceptor,
    state: Mutex<LifecycleState>,
}

impl Worker {
    pub fn new(store: CacheDb, fetcher: Arc<dyn Fetcher>, version: CacheVersion, manifest: Vec<Url>) -> Self {
        Self {
            bootstrap: Bootstrap::new(store.clone(), Arc::clone(&fetcher), version.clone(), manifest),
            reaper: Reaper::new(store.clone(), version.clone()),
            interceptor: Interceptor::new(store, fetcher, version.clone()),
            version,
            state: Mutex::new(LifecycleState::Parsed),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    fn set_state(&self, next: LifecycleState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != from {
            return Err(Error::InvalidState(format!("cannot enter {to:?} from {:?}", *state)));
        }
        *state = to;
        Ok(())
    }

    /// Handle the install event.
    ///
    /// A failed bootstrap leaves the worker redundant.
    pub async fn install(&self) -> Result<BootstrapReport, Error> {
        self.transition(LifecycleState::Parsed, LifecycleState::Installing)?;
        tracing::info!(version = %self.version, "install event in progress");

        match self.bootstrap.run().await {
            Ok(report) => {
                self.set_state(LifecycleState::Installed);
                Ok(report)
            }
            Err(e) => {
                tracing::error!(version = %self.version, error = %e, "install failed");
                self.set_state(LifecycleState::Redundant);
                Err(e)
            }
        }
    }

    /// Handle the activate event.
    ///
    /// If the store cannot even be listed the worker stays installed and the
    /// host may retry.
    pub async fn activate(&self) -> Result<ReapReport, Error> {
        self.transition(LifecycleState::Installed, LifecycleState::Activating)?;
        tracing::info!(version = %self.version, "activate event in progress");

        match self.reaper.run().await {
            Ok(report) => {
                self.set_state(LifecycleState::Activated);
                Ok(report)
            }
            Err(e) => {
                tracing::error!(version = %self.version, error = %e, "activate failed");
                self.set_state(LifecycleState::Installed);
                Err(e)
            }
        }
    }

    /// Handle a fetch event.
    pub async fn handle_fetch(&self, request: Request) -> Interception {
        let state = self.state();
        if state != LifecycleState::Activated {
            tracing::debug!(?state, url = %request.url(), "worker not active, passing through");
            return Interception::Passthrough(request);
        }
        self.interceptor.intercept(request).await
    }
}
