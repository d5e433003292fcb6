//! Schema for the versioned store.
//!
//! The store holds two tables: `generations` (one row per named
//! generation, in creation order) and `entries` (responses keyed by
//! generation and request key). `_migrations` records which schema
//! versions a database file has seen, so reopening an existing store
//! only applies what is new.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Schema versions in ascending order.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_generations.sql"))];

/// Bring the schema up to the latest version.
///
/// Each pending version is applied together with its `_migrations` row in
/// one transaction, so a failed step leaves the store at the previous
/// version.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "store schema upgraded");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
