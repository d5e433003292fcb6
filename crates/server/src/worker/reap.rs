//! Activation-time removal of generations left behind by older versions.

use futures_util::future::join_all;
use larder_core::{CacheDb, CacheVersion, Error};

/// What a reaping pass did.
#[derive(Debug, Clone, Default)]
pub struct ReapReport {
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Deletes every generation that does not carry the current version prefix.
///
/// Deletions run independently; a failed one is logged and reported but
/// neither stops the others nor fails the pass.
pub struct Reaper {
    store: CacheDb,
    version: CacheVersion,
}

impl Reaper {
    pub fn new(store: CacheDb, version: CacheVersion) -> Self {
        Self { store, version }
    }

    /// # Errors
    ///
    /// Only fails if the generations cannot be listed.
    pub async fn run(&self) -> Result<ReapReport, Error> {
        let (kept, stale): (Vec<String>, Vec<String>) = self
            .store
            .list_generations()
            .await?
            .into_iter()
            .partition(|name| self.version.owns(name));

        let outcomes = join_all(stale.into_iter().map(|name| async move {
            let outcome = self.store.delete_generation(&name).await;
            (name, outcome)
        }))
        .await;

        let mut report = ReapReport { kept, ..Default::default() };
        for (name, outcome) in outcomes {
            match outcome {
                Ok(existed) => {
                    tracing::debug!(generation = %name, existed, "stale generation deleted");
                    report.deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!(generation = %name, error = %e, "failed to delete stale generation");
                    report.failed.push(name);
                }
            }
        }

        tracing::info!(
            version = %self.version,
            kept = report.kept.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "activate completed"
        );
        Ok(report)
    }
}
