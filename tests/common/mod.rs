#![allow(dead_code)]

use anyhow::{bail, Result};
use authguard::api::ApiClient;
use authguard::clock::{Clock, SystemClock};
use authguard::session::{AuthContext, SessionDeps, SessionState};
use authguard::shell::{MemoryHistory, NotificationLog};
use authguard::storage::MemoryStore;
use authguard::token::TokenStore;
use base64ct::{Base64UrlUnpadded, Encoding};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Fixed wall-clock origin for paused-time tests.
pub const EPOCH: i64 = 1_767_225_600;

/// Unsigned three-segment token around `claims`.
pub fn token(claims: &Value) -> String {
    let header = Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = Base64UrlUnpadded::encode_string(claims.to_string().as_bytes());
    format!("{header}.{body}.signature")
}

/// Access credential expiring `exp_in` seconds after `now`, with a refresh
/// window ending `refresh_in` seconds after `now`.
pub fn credential(sub: &str, roles: &[&str], now: i64, exp_in: i64, refresh_in: i64) -> String {
    token(&json!({
        "sub": sub,
        "fullName": format!("User {sub}"),
        "email": format!("{sub}@example.com"),
        "roles": roles,
        "branchCode": "HN01",
        "branchName": "Hà Nội",
        "iat": now - 10,
        "exp": now + exp_in,
        "refreshExp": (now + refresh_in) * 1000,
    }))
}

/// Wall clock pinned to [`EPOCH`] that follows tokio's (possibly paused) time.
pub struct PausedClock {
    start: tokio::time::Instant,
}

impl PausedClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now(&self) -> i64 {
        let elapsed = i64::try_from(self.start.elapsed().as_secs()).unwrap_or(i64::MAX);
        EPOCH + elapsed
    }
}

/// Clock set by hand.
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn system_now() -> i64 {
    SystemClock.now()
}

/// A session wired to in-memory shell adapters.
pub struct Harness {
    pub session: AuthContext,
    pub store: MemoryStore,
    pub tokens: TokenStore,
    pub history: Arc<MemoryHistory>,
    pub notifications: Arc<NotificationLog>,
}

impl Harness {
    pub fn new(base_url: &str, page: &str, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::on_store(MemoryStore::new(), base_url, page, clock)
    }

    pub fn on_store(
        store: MemoryStore,
        base_url: &str,
        page: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let tokens = TokenStore::new(Arc::new(store.clone()));
        let api = ApiClient::new(base_url.parse()?, tokens.clone())?;
        let history = Arc::new(MemoryHistory::new(page.parse()?));
        let notifications = Arc::new(NotificationLog::new());
        let session = AuthContext::new(SessionDeps {
            api,
            navigator: history.clone(),
            notifier: notifications.clone(),
            clock,
        });
        Ok(Self {
            session,
            store,
            tokens,
            history,
            notifications,
        })
    }

    pub fn paths(&self) -> Vec<String> {
        self.history
            .entries()
            .iter()
            .map(|url| url.path().to_string())
            .collect()
    }
}

/// Waits until the session state satisfies `predicate`.
pub async fn wait_for_session<F>(
    changes: &mut watch::Receiver<SessionState>,
    predicate: F,
) -> Result<SessionState>
where
    F: Fn(&SessionState) -> bool,
{
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let state = changes.borrow_and_update();
                if predicate(&state) {
                    return Ok(state.clone());
                }
            }
            if changes.changed().await.is_err() {
                bail!("session dropped while waiting");
            }
        }
    })
    .await;

    match waited {
        Ok(result) => result,
        Err(_) => bail!("timed out waiting for session state"),
    }
}

/// Base URL nothing listens on.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";
