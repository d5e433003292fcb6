//! Store-wide generation operations.
//!
//! Listing, deleting and cross-generation lookup. Generations are reported
//! in creation order.

use super::connection::CacheDb;
use super::entries::{StoredResponse, read_row};
use super::key::RequestKey;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Summary of one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationStat {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
}

impl CacheDb {
    /// List every generation name, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and every entry in it.
    ///
    /// Returns false if no generation with that name existed.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE generation = ?1", params![name])?;
                let deleted = tx.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look a request up across all generations.
    ///
    /// The oldest generation holding the key wins.
    pub async fn match_any(&self, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let key = key.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.url, e.status, e.status_text, e.headers_json, e.content_type, e.body, e.stored_at
                     FROM entries e
                     JOIN generations g ON g.name = e.generation
                     WHERE e.request_key = ?1
                     ORDER BY g.rowid ASC
                     LIMIT 1",
                )?;

                match stmt.query_row(params![key], read_row) {
                    Ok(row) => Ok(Some(row.decode()?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Entry counts per generation, oldest first.
    pub async fn generation_stats(&self) -> Result<Vec<GenerationStat>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationStat>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, COUNT(e.request_key), g.created_at
                     FROM generations g
                     LEFT JOIN entries e ON e.generation = g.name
                     GROUP BY g.name
                     ORDER BY g.rowid ASC",
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(GenerationStat {
                            name: row.get(0)?,
                            entries: row.get::<_, i64>(1)? as u64,
                            created_at: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }
}
