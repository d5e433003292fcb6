//! Install-time population of the `fundamentals` generation.

use std::sync::Arc;

use futures_util::future::join_all;
use larder_client::{Fetcher, Request};
use larder_core::{CacheDb, CacheVersion, Error, Namespace, RequestKey, StoredResponse};
use url::Url;

/// What a successful install stored.
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub generation: String,
    pub stored: Vec<Url>,
}

/// Fetches the manifest and commits it as one batch.
///
/// Every resource must come back with a 2xx status. If any one of them
/// fails nothing is written, and the install fails.
pub struct Bootstrap {
    store: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    version: CacheVersion,
    manifest: Vec<Url>,
}

impl Bootstrap {
    pub fn new(store: CacheDb, fetcher: Arc<dyn Fetcher>, version: CacheVersion, manifest: Vec<Url>) -> Self {
        Self { store, fetcher, version, manifest }
    }

    pub async fn run(&self) -> Result<BootstrapReport, Error> {
        let name = self.version.generation(Namespace::Fundamentals);
        let generation = self.store.open_generation(&name).await?;

        // Every fetch runs to completion before the outcome is judged.
        let outcomes = join_all(self.manifest.iter().map(|url| self.fetch_one(url))).await;
        let entries = outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;

        generation.put_all(entries).await?;

        tracing::info!(generation = %name, count = self.manifest.len(), "install completed");
        Ok(BootstrapReport { generation: name, stored: self.manifest.clone() })
    }

    async fn fetch_one(&self, url: &Url) -> Result<(RequestKey, StoredResponse), Error> {
        let request = Request::get(url.clone());
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| Error::BootstrapFailed(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::BootstrapFailed(format!("{url}: status {}", response.status().as_u16())));
        }

        Ok((request.key(), response.into_stored(request.url())))
    }
}
