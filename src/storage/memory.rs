use super::{announce, next_origin, ClientStorage, StorageError, StorageEvent, EVENT_CAPACITY};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

struct Shared {
    entries: Mutex<HashMap<String, String>>,
    tx: broadcast::Sender<StorageEvent>,
}

/// In-memory store; clones of one store share data and the change feed.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    origin: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                tx,
            }),
            origin: next_origin(),
        }
    }

    /// Opens another handle on the same data with its own origin.
    #[must_use]
    pub fn open_tab(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            origin: next_origin(),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // a poisoned map still holds consistent string pairs
        self.shared
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ClientStorage for MemoryStore {
    fn origin(&self) -> u64 {
        self.origin
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        {
            let mut map = self.entries();
            for (key, value) in entries {
                map.insert((*key).to_string(), (*value).to_string());
            }
        }
        announce(
            &self.shared.tx,
            self.origin,
            entries.iter().map(|(key, _)| (*key).to_string()),
        );
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let removed: Vec<String> = {
            let mut map = self.entries();
            keys.iter()
                .filter(|key| map.remove(**key).is_some())
                .map(|key| (*key).to_string())
                .collect()
        };
        announce(&self.shared.tx, self.origin, removed);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.shared.tx.subscribe()
    }
}
