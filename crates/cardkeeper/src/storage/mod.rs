//! Key/value storage adapters for cardkeeper.
//!
//! The card store only needs two operations from its storage: read the bytes
//! under a key and replace the bytes under a key. [`KvStore`] captures exactly
//! that, and this module provides three implementations:
//!
//! - [`SqliteKvStore`]: a `SQLite` database with a single `kv` table
//! - [`FileKvStore`]: one file per key, replaced atomically
//! - [`MemoryKvStore`]: an in-process map, with failure injection for tests
//!
//! There are no transactions across keys.

pub mod file;
pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{Backend, Config};
use crate::error::Result;

pub use file::FileKvStore;
pub use memory::MemoryKvStore;
pub use sqlite::{SqliteKvStore, StorageStats};

/// Asynchronous key/value byte storage.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Short name of the backend (for logging and status output).
    fn backend(&self) -> &'static str;

    /// Where the data lives (a path, or `:memory:`).
    fn location(&self) -> String;

    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing is stored under the key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Database statistics, for backends that keep a database.
    async fn database_stats(&self) -> Result<Option<StorageStats>> {
        Ok(None)
    }
}

/// Open the storage backend selected by the configuration.
///
/// # Errors
///
/// Returns an error if the backend cannot be opened or its directory created.
pub fn open_backend(config: &Config) -> Result<Arc<dyn KvStore>> {
    let path = config.storage_path();
    debug!(backend = %config.storage.backend, path = %path.display(), "Opening storage");
    let store: Arc<dyn KvStore> = match config.storage.backend {
        Backend::Sqlite => Arc::new(SqliteKvStore::open(&path)?),
        Backend::File => Arc::new(FileKvStore::open(&path)?),
    };
    Ok(store)
}
