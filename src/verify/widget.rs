//! Adapter around the third-party challenge widget.
//!
//! The widget script loads asynchronously, so rendering waits until the
//! widget reports ready, polling every 200 ms up to a timeout. A config change
//! disposes the rendered instance before rendering again; teardown disposes it
//! for good.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

pub const SCRIPT_ID: &str = "cf-turnstile-script";
pub const SCRIPT_SRC: &str = "https://challenges.cloudflare.com/turnstile/v0/api.js?render=explicit";

pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(15);

pub const DEFAULT_ACTION: &str = "login";
pub const DEFAULT_WIDGET_NAME: &str = "authguard-fe";

#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("challenge widget not ready after {0:?}")]
    NotReady(Duration),
    #[error("failed to render challenge widget: {0}")]
    Render(String),
    #[error("failed to load challenge script: {0}")]
    Script(String),
    #[error("no challenge widget attached")]
    Missing,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WidgetConfig {
    pub site_key: String,
    pub theme: Theme,
    pub action: String,
    pub widget_name: String,
}

impl WidgetConfig {
    #[must_use]
    pub fn new(site_key: impl Into<String>) -> Self {
        Self {
            site_key: site_key.into(),
            theme: Theme::default(),
            action: DEFAULT_ACTION.to_string(),
            widget_name: DEFAULT_WIDGET_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }
}

/// Id of a rendered widget instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WidgetHandle(pub String);

/// Receives each solution token the widget produces.
pub type SolutionCallback = Arc<dyn Fn(String) + Send + Sync>;

pub trait ChallengeWidget: Send + Sync {
    /// True once the widget script has loaded.
    fn is_ready(&self) -> bool;

    /// # Errors
    ///
    /// Returns `WidgetError::Render` if the widget rejects the config.
    fn render(
        &self,
        config: &WidgetConfig,
        on_solution: SolutionCallback,
    ) -> Result<WidgetHandle, WidgetError>;

    fn dispose(&self, handle: &WidgetHandle);
}

/// Document host the widget script is injected into.
pub trait ScriptHost: Send + Sync {
    fn has_script(&self, id: &str) -> bool;

    /// # Errors
    ///
    /// Returns `WidgetError::Script` if the tag cannot be added.
    fn inject_script(&self, id: &str, src: &str) -> Result<(), WidgetError>;
}

/// Adds the widget script once. Returns whether a tag was injected.
///
/// # Errors
///
/// Returns `WidgetError::Script` if injection fails.
pub fn ensure_script(host: &dyn ScriptHost) -> Result<bool, WidgetError> {
    if host.has_script(SCRIPT_ID) {
        return Ok(false);
    }
    host.inject_script(SCRIPT_ID, SCRIPT_SRC)?;
    debug!("Challenge script injected");
    Ok(true)
}

struct Rendered {
    config: WidgetConfig,
    handle: WidgetHandle,
}

/// Owns at most one rendered widget instance.
pub struct ChallengeHost {
    widget: Arc<dyn ChallengeWidget>,
    rendered: Mutex<Option<Rendered>>,
    ready_timeout: Duration,
}

impl ChallengeHost {
    #[must_use]
    pub fn new(widget: Arc<dyn ChallengeWidget>) -> Self {
        Self {
            widget,
            rendered: Mutex::new(None),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_ready_timeout(mut self, ready_timeout: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }

    /// # Errors
    ///
    /// Returns `WidgetError::NotReady` when the timeout elapses first.
    pub async fn wait_until_ready(&self) -> Result<(), WidgetError> {
        let widget = Arc::clone(&self.widget);
        timeout(self.ready_timeout, async move {
            while !widget.is_ready() {
                sleep(READY_POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| WidgetError::NotReady(self.ready_timeout))
    }

    /// Renders for `config`, reusing the current instance if the config is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns `WidgetError` if the widget never becomes ready or refuses to
    /// render.
    pub async fn show(
        &self,
        config: &WidgetConfig,
        on_solution: SolutionCallback,
    ) -> Result<WidgetHandle, WidgetError> {
        let unchanged = self
            .lock()
            .as_ref()
            .filter(|rendered| rendered.config == *config)
            .map(|rendered| rendered.handle.clone());
        if let Some(handle) = unchanged {
            return Ok(handle);
        }

        self.wait_until_ready().await?;

        let mut rendered = self.lock();
        if let Some(previous) = rendered.take() {
            self.widget.dispose(&previous.handle);
        }
        let handle = self.widget.render(config, on_solution)?;
        info!(action = %config.action, theme = config.theme.as_str(), "Challenge widget rendered");
        *rendered = Some(Rendered {
            config: config.clone(),
            handle: handle.clone(),
        });
        Ok(handle)
    }

    #[must_use]
    pub fn current(&self) -> Option<WidgetHandle> {
        self.lock().as_ref().map(|rendered| rendered.handle.clone())
    }

    pub fn teardown(&self) {
        if let Some(rendered) = self.lock().take() {
            self.widget.dispose(&rendered.handle);
            debug!("Challenge widget disposed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Rendered>> {
        self.rendered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for ChallengeHost {
    fn drop(&mut self) {
        self.teardown();
    }
}
