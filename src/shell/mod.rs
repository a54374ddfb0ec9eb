//! Seams to the hosting shell: history/navigation and transient notifications.
//! A browser binding implements these over `window.history` and a toast
//! component; the in-memory versions back the headless driver and tests.

mod history;
mod notify;

pub use history::MemoryHistory;
pub use notify::NotificationLog;

use serde::Serialize;
use url::Url;

pub trait Navigator: Send + Sync {
    /// Current page URL, query included.
    fn location(&self) -> Url;

    /// Pushes a new location (path, optionally with query).
    fn navigate(&self, path: &str);

    /// Rewrites the current location without a navigation, like `replaceState`.
    fn replace(&self, path: &str);

    fn path(&self) -> String {
        self.location().path().to_string()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Default,
    Destructive,
}

/// A transient toast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

impl Notification {
    #[must_use]
    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: Variant::Destructive,
        }
    }

    #[must_use]
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: Variant::Default,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
