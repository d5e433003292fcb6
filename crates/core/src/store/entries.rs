//! Per-generation entry operations.
//!
//! A [`Generation`] handle is what `open` hands out: reads and writes
//! through it are scoped to a single generation.

use super::connection::CacheDb;
use super::key::RequestKey;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::rusqlite::{self, Transaction};
use tokio_rusqlite::params;

/// A response as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StoredResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

/// Handle to one named generation of the store.
#[derive(Clone, Debug)]
pub struct Generation {
    db: CacheDb,
    name: String,
}

impl CacheDb {
    /// Open a generation by name, creating it if it doesn't exist.
    pub async fn open_generation(&self, name: &str) -> Result<Generation, Error> {
        let owned = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_generation(conn, &owned)?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Generation { db: self.clone(), name: name.to_string() })
    }
}

impl Generation {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the entry stored under `key` in this generation.
    pub async fn get(&self, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let name = self.name.clone();
        let key = key.as_str().to_string();
        self.db
            .conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, status_text, headers_json, content_type, body, stored_at
                     FROM entries WHERE generation = ?1 AND request_key = ?2",
                )?;

                match stmt.query_row(params![name, key], read_row) {
                    Ok(row) => Ok(Some(row.decode()?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace a single entry.
    pub async fn put(&self, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
        self.put_all(vec![(key.clone(), response.clone())]).await
    }

    /// Insert or replace a batch of entries atomically.
    ///
    /// Either every entry is committed or none is.
    pub async fn put_all(&self, entries: Vec<(RequestKey, StoredResponse)>) -> Result<(), Error> {
        let name = self.name.clone();
        let count = entries.len();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_generation(&tx, &name)?;
                for (key, response) in &entries {
                    upsert_entry(&tx, &name, key, response)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(generation = %self.name, count, "entries written");
        Ok(())
    }

    /// List the request keys held by this generation.
    pub async fn keys(&self) -> Result<Vec<RequestKey>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare("SELECT request_key FROM entries WHERE generation = ?1 ORDER BY request_key")?;
                let keys = stmt
                    .query_map(params![name], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys.into_iter().map(RequestKey::from_raw).collect())
            })
            .await
            .map_err(Error::from)
    }
}

fn ensure_generation(conn: &rusqlite::Connection, name: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn upsert_entry(tx: &Transaction<'_>, generation: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&response.headers)?;
    tx.execute(
        "INSERT INTO entries (
            generation, request_key, url, status, status_text,
            headers_json, content_type, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(generation, request_key) DO UPDATE SET
            url = excluded.url,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            content_type = excluded.content_type,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            key.as_str(),
            &response.url,
            response.status,
            &response.status_text,
            headers_json,
            &response.content_type,
            &response.body,
            &response.stored_at,
        ],
    )?;
    Ok(())
}

/// Raw columns of an `entries` row, before the headers are decoded.
pub(crate) struct EntryRow {
    url: String,
    status: u16,
    status_text: String,
    headers_json: String,
    content_type: Option<String>,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    pub(crate) fn decode(self) -> Result<StoredResponse, Error> {
        Ok(StoredResponse {
            url: self.url,
            status: self.status,
            status_text: self.status_text,
            headers: serde_json::from_str(&self.headers_json)?,
            content_type: self.content_type,
            body: self.body,
            stored_at: self.stored_at,
        })
    }
}

/// Column order: url, status, status_text, headers_json, content_type, body, stored_at.
pub(crate) fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        url: row.get(0)?,
        status: row.get(1)?,
        status_text: row.get(2)?,
        headers_json: row.get(3)?,
        content_type: row.get(4)?,
        body: row.get(5)?,
        stored_at: row.get(6)?,
    })
}
