//! Snapshot storage for the library's six collections.
//!
//! The gateway only moves opaque JSON values around. Decoding, and skipping
//! records that fail to decode, is the library's job.

mod json_store;
#[cfg(feature = "sqlite")]
mod sqlite_store;

pub use json_store::JsonFileStore;
#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteStore;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Tracks,
    Playlists,
    SmartPlaylists,
    Favorites,
    RecentlyPlayed,
    RecentlyAdded,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Tracks,
        Collection::Playlists,
        Collection::SmartPlaylists,
        Collection::Favorites,
        Collection::RecentlyPlayed,
        Collection::RecentlyAdded,
    ];

    /// Storage key, also used as the JSON file stem.
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Tracks => "tracks",
            Collection::Playlists => "playlists",
            Collection::SmartPlaylists => "smartPlaylists",
            Collection::Favorites => "favorites",
            Collection::RecentlyPlayed => "recentlyPlayed",
            Collection::RecentlyAdded => "recentlyAdded",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Collection-keyed snapshot load/save. Implementations block; the library
/// calls them from the blocking pool, one write at a time.
pub trait PersistenceGateway: Send + Sync {
    fn save(&self, collection: Collection, data: &Value) -> Result<()>;

    /// `None` when the collection has never been written.
    fn load(&self, collection: Collection) -> Result<Option<Value>>;

    /// Write several collections as one batch.
    fn save_all(&self, entries: &[(Collection, Value)]) -> Result<()> {
        for (collection, data) in entries {
            self.save(*collection, data)?;
        }
        Ok(())
    }
}

/// In-process store. Counts batches so callers can check how often they hit storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, Value>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` / `save_all` calls so far; a batch counts once.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Collection, Value>>> {
        self.collections
            .lock()
            .map_err(|e| PersistenceError::LockPoisoned(e.to_string()))
    }
}

impl PersistenceGateway for MemoryStore {
    fn save(&self, collection: Collection, data: &Value) -> Result<()> {
        self.lock()?.insert(collection, data.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, collection: Collection) -> Result<Option<Value>> {
        Ok(self.lock()?.get(&collection).cloned())
    }

    fn save_all(&self, entries: &[(Collection, Value)]) -> Result<()> {
        let mut collections = self.lock()?;
        for (collection, data) in entries {
            collections.insert(*collection, data.clone());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
