//! Human-verification gate in front of the whole client.
//!
//! Nothing but the challenge renders until the gate is `Verified`. A cached
//! verification credential short-circuits the challenge while it is unexpired;
//! an expired or unreadable one is deleted on sight. Local development hosts
//! skip the gate entirely.

pub mod client;
pub mod widget;

pub use widget::{
    ensure_script, ChallengeHost, ChallengeWidget, ScriptHost, SolutionCallback, Theme,
    WidgetConfig, WidgetError, WidgetHandle,
};

use crate::api::ApiClient;
use crate::clock::Clock;
use crate::errors::AppError;
use crate::token::{TokenStore, VerificationClaims};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Hosts that bypass the gate.
pub const BYPASS_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

pub const NO_TOKEN_MESSAGE: &str = "Không nhận được token xác thực từ server!";
pub const DEFAULT_FAILURE_MESSAGE: &str = "Xác minh robot thất bại!";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum VerificationState {
    #[default]
    Unverified,
    Verifying,
    Verified,
    VerificationFailed(String),
}

impl VerificationState {
    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationState::Verified)
    }
}

#[must_use]
pub fn is_bypass_host(host: &str) -> bool {
    BYPASS_HOSTS.contains(&host)
}

struct GateInner {
    api: ApiClient,
    clock: Arc<dyn Clock>,
    state: watch::Sender<VerificationState>,
    last_solution: Mutex<Option<String>>,
}

#[derive(Clone)]
pub struct HumanVerificationGate {
    inner: Arc<GateInner>,
}

impl HumanVerificationGate {
    #[must_use]
    pub fn new(api: ApiClient, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(VerificationState::Unverified);
        Self {
            inner: Arc::new(GateInner {
                api,
                clock,
                state,
                last_solution: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> VerificationState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.inner.state.borrow().is_verified()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<VerificationState> {
        self.inner.state.subscribe()
    }

    fn tokens(&self) -> &TokenStore {
        self.inner.api.tokens()
    }

    fn publish(&self, next: VerificationState) -> VerificationState {
        self.inner.state.send_replace(next.clone());
        next
    }

    /// Evaluates the gate when the client boots on `host`.
    pub fn mount(&self, host: &str) -> VerificationState {
        if is_bypass_host(host) {
            info!(host, "Development host; human verification skipped");
            return self.publish(VerificationState::Verified);
        }

        let Some(stored) = self.tokens().verification_token() else {
            return self.publish(VerificationState::Unverified);
        };

        let now = self.inner.clock.now();
        match VerificationClaims::parse(stored.expose_secret()) {
            Ok(claims) if claims.is_valid_at(now) => {
                debug!("Cached verification credential accepted");
                self.publish(VerificationState::Verified)
            }
            Ok(_) => {
                info!("Verification credential expired");
                self.discard_credential();
                self.publish(VerificationState::Unverified)
            }
            Err(err) => {
                warn!("Verification credential is unreadable: {err}");
                self.discard_credential();
                self.publish(VerificationState::Unverified)
            }
        }
    }

    /// Exchanges a solution token from the widget. Empty tokens and repeats of
    /// the last token are ignored.
    pub async fn on_solution(&self, solution: &str) -> VerificationState {
        if solution.is_empty() {
            return self.state();
        }
        {
            let mut last = self
                .inner
                .last_solution
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if last.as_deref() == Some(solution) {
                debug!("Duplicate challenge solution ignored");
                return self.state();
            }
            *last = Some(solution.to_string());
        }

        self.publish(VerificationState::Verifying);

        match client::verify_human(&self.inner.api, solution).await {
            Ok(Some(credential)) => {
                if let Err(err) = self
                    .tokens()
                    .set_verification_token(credential.expose_secret())
                {
                    error!("Failed to persist verification credential: {err}");
                }
                info!("Human verification passed");
                self.publish(VerificationState::Verified)
            }
            Ok(None) => {
                warn!("Verification response carried no credential");
                self.discard_credential();
                self.publish(VerificationState::VerificationFailed(
                    NO_TOKEN_MESSAGE.to_string(),
                ))
            }
            Err(err) => {
                warn!("Human verification failed: {err}");
                self.discard_credential();
                self.publish(VerificationState::VerificationFailed(failure_message(&err)))
            }
        }
    }

    /// Widget callback that runs [`Self::on_solution`] on the current runtime.
    #[must_use]
    pub fn solution_callback(&self) -> SolutionCallback {
        let gate = self.clone();
        let runtime = tokio::runtime::Handle::try_current().ok();
        Arc::new(move |solution: String| {
            let Some(runtime) = runtime.as_ref() else {
                error!("Challenge solution dropped; no tokio runtime");
                return;
            };
            let gate = gate.clone();
            runtime.spawn(async move {
                gate.on_solution(&solution).await;
            });
        })
    }

    fn discard_credential(&self) {
        if let Err(err) = self.tokens().remove_verification_token() {
            error!("Failed to remove verification credential: {err}");
        }
    }
}

/// Server-provided message when the backend answered, the fixed fallback
/// otherwise.
fn failure_message(err: &AppError) -> String {
    match err {
        AppError::Http { message, .. } if !message.trim().is_empty() => message.clone(),
        _ => DEFAULT_FAILURE_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{failure_message, is_bypass_host, VerificationState, DEFAULT_FAILURE_MESSAGE};
    use crate::errors::AppError;

    #[test]
    fn bypass_hosts() {
        assert!(is_bypass_host("localhost"));
        assert!(is_bypass_host("127.0.0.1"));
        assert!(!is_bypass_host("admin.example.com"));
        assert!(!is_bypass_host("localhost.example.com"));
    }

    #[test]
    fn failure_message_prefers_server_text() {
        let err = AppError::Http {
            status: 400,
            message: "Token captcha không hợp lệ".to_string(),
        };
        assert_eq!(failure_message(&err), "Token captcha không hợp lệ");

        let err = AppError::Network("offline".to_string());
        assert_eq!(failure_message(&err), DEFAULT_FAILURE_MESSAGE);
    }

    #[test]
    fn state_serializes_message() {
        let json = serde_json::to_value(VerificationState::VerificationFailed("x".to_string()))
            .unwrap();
        assert_eq!(json["status"], "verification_failed");
        assert_eq!(json["message"], "x");
        assert!(VerificationState::Verified.is_verified());
    }
}
