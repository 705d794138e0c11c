//! `SQLite`-backed key/value store.
//!
//! Values live in a single `kv` table. The connection is shared behind a
//! mutex and every query runs on tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use super::{migrations, KvStore};
use crate::error::{Error, Result};

/// Key/value store persisted in a `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    /// Open or create a database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let conn = lock(&self.conn)?;

        let (entries, total_value_bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(value)), 0) FROM kv",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let last_write: Option<String> = conn
            .query_row(
                "SELECT updated_at FROM kv ORDER BY updated_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let last_write = last_write
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            entries,
            total_value_bytes,
            last_write,
            db_size_bytes,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::internal(format!("storage task failed: {e}")))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| Error::internal("database connection lock poisoned"))
}

#[async_trait]
impl KvStore for SqliteKvStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let value = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", [&key], |row| {
                    row.get::<_, Vec<u8>>(0)
                })
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let len = value.len();
            conn.execute(
                r"
                INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                ",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
            debug!(key = %key, bytes = len, "Stored value");
            Ok(())
        })
        .await
    }

    async fn database_stats(&self) -> Result<Option<StorageStats>> {
        Ok(Some(self.stats()?))
    }
}

/// Statistics about the key/value database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of stored keys.
    pub entries: i64,
    /// Sum of all stored value sizes in bytes.
    pub total_value_bytes: i64,
    /// Time of the most recent write.
    pub last_write: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteKvStore {
        SqliteKvStore::open_in_memory().expect("failed to create test storage")
    }

    fn remove_db(path: &Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_in_memory() {
        let store = SqliteKvStore::open_in_memory();
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = create_test_store();
        assert!(store.get("savedCards").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = create_test_store();
        store.set("savedCards", b"[]".to_vec()).await.unwrap();

        let value = store.get("savedCards").await.unwrap();
        assert_eq!(value, Some(b"[]".to_vec()));
    }

    #[tokio::test]
    async fn test_set_replaces_value() {
        let store = create_test_store();
        store.set("k", b"first".to_vec()).await.unwrap();
        store.set("k", b"second".to_vec()).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.stats().unwrap().entries, 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = create_test_store();
        store.set("a", b"1".to_vec()).await.unwrap();
        store.set("b", b"2".to_vec()).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get("b").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_unicode_value() {
        let store = create_test_store();
        let value = "Joyeux anniversaire 🎂 お誕生日おめでとう".as_bytes().to_vec();
        store.set("k", value.clone()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(value));
    }

    #[test]
    fn test_stats_empty() {
        let store = create_test_store();
        let stats = store.stats().unwrap();

        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_value_bytes, 0);
        assert!(stats.last_write.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_stats_with_data() {
        let store = create_test_store();
        store.set("k", b"12345".to_vec()).await.unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_value_bytes, 5);
        assert!(stats.last_write.is_some());
    }

    #[tokio::test]
    async fn test_database_stats_through_trait() {
        let store: Arc<dyn KvStore> = Arc::new(create_test_store());
        store.set("k", b"abc".to_vec()).await.unwrap();

        let stats = store.database_stats().await.unwrap().unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_value_bytes, 3);
    }

    #[test]
    fn test_path() {
        let store = create_test_store();
        assert_eq!(store.path().to_string_lossy(), ":memory:");
        assert_eq!(store.location(), ":memory:");
    }

    #[tokio::test]
    async fn test_open_file_based_persists() {
        let db_path =
            std::env::temp_dir().join(format!("cardkeeper_kv_test_{}.db", std::process::id()));

        let store = SqliteKvStore::open(&db_path).unwrap();
        store.set("savedCards", b"[1]".to_vec()).await.unwrap();
        assert_eq!(store.path(), db_path);
        drop(store);

        let reopened = SqliteKvStore::open(&db_path).unwrap();
        assert_eq!(
            reopened.get("savedCards").await.unwrap(),
            Some(b"[1]".to_vec())
        );
        assert!(reopened.stats().unwrap().db_size_bytes > 0);

        drop(reopened);
        remove_db(&db_path);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let nested_path = std::env::temp_dir().join(format!(
            "cardkeeper_kv_test_{}/nested/cards.db",
            std::process::id()
        ));

        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let store = SqliteKvStore::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(store);
        if let Some(root) = nested_path.parent().and_then(Path::parent) {
            let _ = std::fs::remove_dir_all(root);
        }
    }
}
