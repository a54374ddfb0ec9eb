use super::{announce, next_origin, ClientStorage, StorageError, StorageEvent, EVENT_CAPACITY};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::warn;

/// JSON-file backed store for the headless driver.
///
/// The whole map is rewritten through a temporary file and renamed into place,
/// so a crash never leaves a half-written credential pair behind.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
    tx: broadcast::Sender<StorageEvent>,
    origin: u64,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
            tx,
            origin: next_origin(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>) -> Vec<String>,
    ) -> Result<(), StorageError> {
        let changed = {
            let _guard = self
                .write_lock
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let mut map = self.read_map()?;
            let changed = apply(&mut map);
            if !changed.is_empty() {
                self.write_map(&map)?;
            }
            changed
        };
        announce(&self.tx, self.origin, changed);
        Ok(())
    }
}

impl ClientStorage for FileStore {
    fn origin(&self) -> u64 {
        self.origin
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.read_map() {
            Ok(mut map) => map.remove(key),
            Err(err) => {
                warn!(path = %self.path.display(), "Failed to read client storage: {err}");
                None
            }
        }
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        self.update(|map| {
            entries
                .iter()
                .map(|(key, value)| {
                    map.insert((*key).to_string(), (*value).to_string());
                    (*key).to_string()
                })
                .collect()
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        self.update(|map| {
            keys.iter()
                .filter(|key| map.remove(**key).is_some())
                .map(|key| (*key).to_string())
                .collect()
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::FileStore;
    use crate::storage::ClientStorage;
    use anyhow::Result;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.get("token"), None);
    }

    #[test]
    fn values_survive_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::new(&path);
        store.set_many(&[("token", "a.b.c"), ("refreshToken", "r1")])?;

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("token").as_deref(), Some("a.b.c"));
        assert_eq!(reopened.get("refreshToken").as_deref(), Some("r1"));

        reopened.remove_many(&["token", "refreshToken"])?;
        assert_eq!(store.get("token"), None);
        Ok(())
    }

    #[test]
    fn corrupt_file_reads_as_absent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{not json")?;

        let store = FileStore::new(&path);
        assert_eq!(store.get("token"), None);
        assert!(store.set("token", "x").is_err());
        Ok(())
    }
}
