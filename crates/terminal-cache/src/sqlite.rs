//! SQLite-based storage backend.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

use crate::storage::{StorageBackend, StorageError};

/// SQLite-backed key/value storage.
///
/// Persists across application restarts, which is what lets the terminal
/// show the last-synced watchlist and cached analyses while the backend is
/// down. Operations are synchronous; each call holds the connection lock for
/// a single statement.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|e| StorageError::Backend(e.to_string()))?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    /// Create an in-memory database.
    ///
    /// Useful for testing; data is lost when the storage is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StorageError::Backend(e.to_string()))?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn initialize_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        debug!("SQLite storage schema initialized");
        Ok(())
    }
}

impl StorageBackend for SqliteStorage {
    #[instrument(skip(self), level = "trace")]
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.conn()?
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    #[instrument(skip(self, value), fields(bytes = value.len()), level = "trace")]
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let updated_at = Utc::now().to_rfc3339();
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO local_storage (key, value, updated_at)
                 VALUES (?1, ?2, ?3)",
                params![key, value, updated_at],
            )
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self), level = "trace")]
    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.conn()?
            .execute("DELETE FROM local_storage WHERE key = ?1", params![key])
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_storage_initialization() {
        let storage = SqliteStorage::in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_sqlite_storage_round_trip() {
        let storage = SqliteStorage::in_memory().unwrap();

        // Initially no data
        assert_eq!(storage.get_item("last_symbol").unwrap(), None);

        storage.set_item("last_symbol", "\"AAPL\"").unwrap();
        assert_eq!(
            storage.get_item("last_symbol").unwrap().as_deref(),
            Some("\"AAPL\"")
        );

        // Replace
        storage.set_item("last_symbol", "\"MSFT\"").unwrap();
        assert_eq!(
            storage.get_item("last_symbol").unwrap().as_deref(),
            Some("\"MSFT\"")
        );

        storage.remove_item("last_symbol").unwrap();
        assert_eq!(storage.get_item("last_symbol").unwrap(), None);
    }

    #[test]
    fn test_sqlite_storage_persists_across_connections() {
        let dir = std::env::temp_dir().join(format!(
            "terminal-cache-test-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("storage.db");

        {
            let storage = SqliteStorage::new(&path).unwrap();
            storage.set_item("theme", "\"light\"").unwrap();
        }

        let reopened = SqliteStorage::new(&path).unwrap();
        assert_eq!(
            reopened.get_item("theme").unwrap().as_deref(),
            Some("\"light\"")
        );

        drop(reopened);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
