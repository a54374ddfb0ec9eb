use super::{Notification, Notifier, Variant};
use std::sync::Mutex;
use tracing::{info, warn};

/// Keeps every notification and mirrors it to the log.
#[derive(Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<Notification>>,
}

impl NotificationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Notification> {
        self.entries().pop()
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        match notification.variant {
            Variant::Destructive => warn!(
                title = %notification.title,
                "{}", notification.description
            ),
            Variant::Default => info!(
                title = %notification.title,
                "{}", notification.description
            ),
        }
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(notification);
    }
}
