//! Database connection management with pragma configuration.
//!
//! Opening a store applies the WAL and foreign-key pragmas and runs
//! migrations before the handle is handed out.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Store database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Clones share the same connection.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        tracing::debug!("store opened");
        Ok(Self { conn })
    }

    /// Close the underlying connection.
    ///
    /// Every clone of this handle fails with a database error afterwards.
    pub async fn close(self) -> Result<(), Error> {
        self.conn.close().await.map_err(Error::Database)
    }
}

#[cfg(any(test, feature = "testing"))]
impl CacheDb {
    /// Make every later delete of `generation` abort.
    pub async fn lock_generation(&self, generation: &str) -> Result<(), Error> {
        let sql = format!(
            "CREATE TRIGGER IF NOT EXISTS lock_{} BEFORE DELETE ON generations
             WHEN OLD.name = '{}'
             BEGIN SELECT RAISE(ABORT, 'generation is locked'); END;",
            hex::encode(generation),
            generation.replace('\'', "''")
        );
        self.conn
            .call(move |conn| conn.execute_batch(&sql))
            .await
            .map_err(Error::Database)
    }
}
