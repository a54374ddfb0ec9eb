//! Durable client-local key/value storage.
//!
//! Flow Overview:
//! - Every handle carries an origin id. Handles opened from the same backing
//!   store (`MemoryStore::open_tab`) share data but not origins, modelling
//!   browser tabs over one `localStorage`.
//! - Each mutation is announced on a broadcast feed as a [`StorageEvent`].
//!   Listeners ignore events from their own origin, the same way a browser only
//!   fires `storage` events in *other* tabs.
//!
//! Storage performs no validation; it is a keyed persistence shim.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of the change feed; slow listeners observe `Lagged` and resync.
pub(crate) const EVENT_CAPACITY: usize = 64;

static NEXT_ORIGIN: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_origin() -> u64 {
    NEXT_ORIGIN.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A key changed; `origin` identifies the handle that made the change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub origin: u64,
}

pub trait ClientStorage: Send + Sync {
    /// Origin id of this handle.
    fn origin(&self) -> u64;

    fn get(&self, key: &str) -> Option<String>;

    /// Writes all entries in one step; readers never see a partial write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError>;

    /// Removes all keys in one step. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError>;

    /// Subscribes to the change feed shared by every handle on this store.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set_many(&[(key, value)])
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_many(&[key])
    }
}

pub(crate) fn announce(
    tx: &broadcast::Sender<StorageEvent>,
    origin: u64,
    keys: impl IntoIterator<Item = String>,
) {
    for key in keys {
        // no receivers is fine
        let _ = tx.send(StorageEvent { key, origin });
    }
}
