use super::Navigator;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use url::Url;

/// In-memory history stack.
pub struct MemoryHistory {
    entries: Mutex<Vec<Url>>,
}

impl MemoryHistory {
    #[must_use]
    pub fn new(start: Url) -> Self {
        Self {
            entries: Mutex::new(vec![start]),
        }
    }

    /// Every location visited, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<Url> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Url>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn resolve(current: &Url, path: &str) -> Option<Url> {
        match current.join(path) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!("Ignoring navigation to unparsable path {path}: {err}");
                None
            }
        }
    }
}

impl Navigator for MemoryHistory {
    fn location(&self) -> Url {
        let entries = self.lock();
        // the stack is never empty: new() seeds it and nothing pops
        entries[entries.len() - 1].clone()
    }

    fn navigate(&self, path: &str) {
        let mut entries = self.lock();
        let current = entries[entries.len() - 1].clone();
        if let Some(next) = Self::resolve(&current, path) {
            debug!(path = next.path(), "navigate");
            entries.push(next);
        }
    }

    fn replace(&self, path: &str) {
        let mut entries = self.lock();
        let last = entries.len() - 1;
        if let Some(next) = Self::resolve(&entries[last], path) {
            debug!(path = next.path(), "replace location");
            entries[last] = next;
        }
    }
}
