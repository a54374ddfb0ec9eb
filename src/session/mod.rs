//! Client session state and the context object shared with every consumer.
//!
//! Flow Overview:
//! 1. `resync` reads the stored credential, derives the [`UserView`] and
//!    schedules a renewal; an unreadable credential forces a logout.
//! 2. The renewal timer fires 30 seconds before expiry, exchanges the refresh
//!    token and resyncs from the new credential (see `renewal`).
//! 3. The OAuth2 callback stores a fresh pair and lands the user (see
//!    `callback`).
//! 4. `logout` clears every session-scoped key, cancels the timer, drops cached
//!    responses and returns to `/`.
//!
//! State is published through a `watch` channel; consumers hold a cloned
//! [`AuthContext`] instead of reaching for a global. Token material stays in
//! storage or behind `SecretString` and is never logged.

mod callback;
mod renewal;

pub use callback::{
    error_message_for, CallbackOutcome, CallbackParams, CALLBACK_FAILURE_MESSAGE,
    CALLBACK_FAILURE_TITLE, LOGIN_ERROR_TITLE,
};
pub use renewal::{renewal_delay, MIN_RENEWAL_DELAY_SECS, RENEWAL_MARGIN_SECS};

use crate::api::{auth, ApiClient};
use crate::clock::Clock;
use crate::shell::{Navigator, Notification, Notifier};
use crate::storage::StorageEvent;
use crate::token::store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::token::{CredentialClaims, TokenStore, ROLE_MEMBER};
use renewal::RenewalSlot;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{broadcast::error::RecvError, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Landing route after logout.
pub const ROOT_ROUTE: &str = "/";
pub const LOGIN_ROUTE: &str = "/login";
pub const HOME_ROUTE: &str = "/home";
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// Identity derived from the current credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub roles: BTreeSet<String>,
    pub branch_id: Option<String>,
    pub branch_name: Option<String>,
}

impl UserView {
    #[must_use]
    pub fn from_claims(claims: &CredentialClaims) -> Self {
        Self {
            id: claims.sub.clone(),
            display_name: claims.display_name().to_string(),
            email: claims.email.clone(),
            roles: claims.roles.clone(),
            branch_id: claims.branch_code.clone(),
            branch_name: claims.branch_name.clone(),
        }
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True when the only role is the base member role.
    #[must_use]
    pub fn is_member_only(&self) -> bool {
        is_member_only(&self.roles)
    }
}

pub(crate) fn is_member_only(roles: &BTreeSet<String>) -> bool {
    roles.len() == 1 && roles.contains(ROLE_MEMBER)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(UserView),
}

impl SessionState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserView> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            SessionState::Anonymous => None,
        }
    }
}

/// Collaborators the session needs from the hosting shell.
pub struct SessionDeps {
    pub api: ApiClient,
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

struct Inner {
    tokens: TokenStore,
    api: ApiClient,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<SessionState>,
    renewal: Mutex<RenewalSlot>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn publish(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn renewal(&self) -> MutexGuard<'_, RenewalSlot> {
        self.renewal
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn cancel_renewal(&self) {
        self.renewal().cancel();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.renewal().cancel();
        if let Some(handle) = self
            .watcher
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

/// Auth session context shared across the client.
///
/// Cloning is cheap; the renewal timer and storage watcher are torn down when
/// the last clone is dropped.
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

impl AuthContext {
    /// Builds an anonymous context; call [`AuthContext::resync`] to load the
    /// stored credential.
    #[must_use]
    pub fn new(deps: SessionDeps) -> Self {
        let (state, _) = watch::channel(SessionState::Anonymous);
        Self {
            inner: Arc::new(Inner {
                tokens: deps.api.tokens().clone(),
                api: deps.api,
                navigator: deps.navigator,
                notifier: deps.notifier,
                clock: deps.clock,
                state,
                renewal: Mutex::new(RenewalSlot::default()),
                watcher: Mutex::new(None),
            }),
        }
    }

    fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn user(&self) -> Option<UserView> {
        self.inner.state.borrow().user().cloned()
    }

    #[must_use]
    pub fn roles(&self) -> BTreeSet<String> {
        self.inner
            .state
            .borrow()
            .user()
            .map(|user| user.roles.clone())
            .unwrap_or_default()
    }

    /// Receives every session state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// Recomputes the session from storage.
    pub fn resync(&self) {
        let Some(token) = self.inner.tokens.access_token() else {
            self.inner.cancel_renewal();
            self.inner.publish(SessionState::Anonymous);
            return;
        };

        match CredentialClaims::parse(token.expose_secret()) {
            Ok(claims) => {
                self.inner
                    .publish(SessionState::Authenticated(UserView::from_claims(&claims)));
                self.schedule_renewal(&token, &claims);
            }
            Err(err) => {
                warn!("Stored credential is unreadable, logging out: {err}");
                self.inner.publish(SessionState::Anonymous);
                self.logout();
            }
        }
    }

    /// Clears the session locally. Safe to call when already anonymous.
    pub fn logout(&self) {
        if let Err(err) = self.inner.tokens.clear_session() {
            error!("Failed to clear session storage: {err}");
        }
        self.inner.cancel_renewal();
        self.inner.publish(SessionState::Anonymous);
        self.inner.api.cache().clear();
        debug!("Session cleared");
        self.inner.navigator.navigate(ROOT_ROUTE);
    }

    /// Ends the session on the server, then locally. A server failure is
    /// reported but never keeps the user signed in.
    pub async fn logout_everywhere(&self) {
        if self.inner.tokens.access_token().is_some() {
            if let Err(err) = auth::logout_session(&self.inner.api).await {
                warn!("Server-side logout failed: {err}");
                self.inner
                    .notifier
                    .notify(Notification::destructive("Lỗi đăng xuất", err.to_string()));
            }
        }
        self.logout();
    }

    /// Resyncs whenever another tab changes the credential pair.
    ///
    /// Replaces a watcher started earlier. Requires a tokio runtime.
    pub fn watch_storage(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("Storage watcher needs a tokio runtime; cross-tab sync disabled");
            return;
        };

        let mut feed = self.inner.tokens.subscribe();
        let origin = self.inner.tokens.origin();
        let weak = self.downgrade();

        let handle = runtime.spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) if !affects_session(&event, origin) => continue,
                    Ok(event) => debug!(key = %event.key, "Storage changed in another tab"),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Storage feed lagged; resyncing");
                    }
                    Err(RecvError::Closed) => break,
                }

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                AuthContext::from_inner(inner).resync();
            }
        });

        let previous = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        info!("Watching storage for session changes");
    }
}

fn affects_session(event: &StorageEvent, origin: u64) -> bool {
    event.origin != origin
        && (event.key == ACCESS_TOKEN_KEY || event.key == REFRESH_TOKEN_KEY)
}
