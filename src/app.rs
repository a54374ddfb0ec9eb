//! Boot orchestration: gate, session, callback, route.
//!
//! While the gate is not verified the only thing shown is the challenge
//! widget; it is torn down once verification passes.

use crate::api::ApiClient;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::routes::{decide, GuardInput, RouteDecision};
use crate::session::{AuthContext, CallbackOutcome, SessionDeps, SessionState};
use crate::shell::{Navigator, Notifier};
use crate::storage::ClientStorage;
use crate::token::TokenStore;
use crate::verify::{
    ensure_script, ChallengeHost, ChallengeWidget, HumanVerificationGate, ScriptHost,
    VerificationState, WidgetConfig, WidgetError,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Upper bound on chained guard redirects while settling a path.
const MAX_REDIRECTS: usize = 3;

/// Snapshot after boot or after a challenge was solved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BootReport {
    pub host: String,
    pub verification: VerificationState,
    pub session: SessionState,
    pub callback: CallbackOutcome,
    pub path: String,
    pub decision: RouteDecision,
}

/// Shell-provided collaborators.
pub struct Shell {
    pub storage: Arc<dyn ClientStorage>,
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// Challenge widget and the document its script is loaded into.
pub struct Challenge {
    pub widget: Arc<dyn ChallengeWidget>,
    pub document: Arc<dyn ScriptHost>,
}

struct ChallengeSurface {
    host: ChallengeHost,
    document: Arc<dyn ScriptHost>,
}

pub struct App {
    config: AppConfig,
    gate: HumanVerificationGate,
    session: AuthContext,
    navigator: Arc<dyn Navigator>,
    challenge: Option<ChallengeSurface>,
    session_started: AtomicBool,
}

impl App {
    /// # Errors
    ///
    /// Returns `AppError::Config` when the backend URL is missing or invalid.
    pub fn new(config: AppConfig, shell: Shell) -> Result<Self, AppError> {
        let tokens = TokenStore::new(shell.storage);
        let api = ApiClient::new(config.base_url()?, tokens)?;

        let gate = HumanVerificationGate::new(api.clone(), Arc::clone(&shell.clock));
        let session = AuthContext::new(SessionDeps {
            api,
            navigator: Arc::clone(&shell.navigator),
            notifier: shell.notifier,
            clock: shell.clock,
        });

        Ok(Self {
            config,
            gate,
            session,
            navigator: shell.navigator,
            challenge: None,
            session_started: AtomicBool::new(false),
        })
    }

    /// Attaches the challenge widget shown while the gate is not verified.
    #[must_use]
    pub fn with_challenge(mut self, challenge: Challenge) -> Self {
        self.challenge = Some(ChallengeSurface {
            host: ChallengeHost::new(challenge.widget),
            document: challenge.document,
        });
        self
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn gate(&self) -> &HumanVerificationGate {
        &self.gate
    }

    #[must_use]
    pub fn session(&self) -> &AuthContext {
        &self.session
    }

    /// Mounts the gate and, once verified, starts the session.
    #[instrument(skip(self))]
    pub fn boot(&self) -> BootReport {
        let host = self.host();
        self.gate.mount(&host);
        let callback = self.start_session_if_verified();
        self.report(host, callback)
    }

    /// Submits a challenge solution and continues booting on success.
    pub async fn submit_challenge(&self, solution: &str) -> BootReport {
        self.gate.on_solution(solution).await;
        let callback = self.start_session_if_verified();
        self.report(self.host(), callback)
    }

    /// Renders the challenge widget and waits for the exchange of the next
    /// solution it produces. Returns once the gate is verified or the
    /// exchange failed; the widget stays up after a failure so it can be
    /// solved again.
    ///
    /// # Errors
    ///
    /// Returns `WidgetError` when no widget is attached, the script cannot be
    /// injected, or the widget never becomes ready.
    pub async fn run_challenge(&self) -> Result<BootReport, WidgetError> {
        if !self.gate.is_verified() {
            let surface = self.challenge.as_ref().ok_or(WidgetError::Missing)?;
            let mut changes = self.gate.subscribe();
            let _ = changes.borrow_and_update();

            ensure_script(surface.document.as_ref())?;
            let config = WidgetConfig::new(self.config.turnstile_site_key.clone());
            surface
                .host
                .show(&config, self.gate.solution_callback())
                .await?;

            while changes.changed().await.is_ok() {
                let settled = matches!(
                    *changes.borrow_and_update(),
                    VerificationState::Verified | VerificationState::VerificationFailed(_)
                );
                if settled {
                    break;
                }
            }
        }

        let callback = self.start_session_if_verified();
        Ok(self.report(self.host(), callback))
    }

    /// Route decision for the current path, following guard redirects.
    pub fn settle(&self) -> RouteDecision {
        let mut decision = self.decide();
        for _ in 0..MAX_REDIRECTS {
            let RouteDecision::Redirect { to } = decision else {
                break;
            };
            debug!(to, "Guard redirect");
            self.navigator.navigate(to);
            decision = self.decide();
        }
        decision
    }

    /// Route decision for the current path without navigating.
    #[must_use]
    pub fn decide(&self) -> RouteDecision {
        let path = self.navigator.path();
        let roles = self.session.roles();
        decide(&GuardInput {
            verified: self.gate.is_verified(),
            is_authenticated: self.session.is_authenticated(),
            path: &path,
            roles: &roles,
        })
    }

    fn start_session_if_verified(&self) -> CallbackOutcome {
        if !self.gate.is_verified() {
            return CallbackOutcome::NotACallback;
        }
        if let Some(surface) = &self.challenge {
            surface.host.teardown();
        }
        if self.session_started.swap(true, Ordering::SeqCst) {
            return CallbackOutcome::NotACallback;
        }

        let location = self.navigator.location();
        self.session.resync();
        self.session.watch_storage();
        let callback = self.session.handle_oauth_callback_at(&location);
        info!(authenticated = self.session.is_authenticated(), "Session started");
        callback
    }

    fn host(&self) -> String {
        self.navigator
            .location()
            .host_str()
            .unwrap_or_default()
            .to_string()
    }

    fn report(&self, host: String, callback: CallbackOutcome) -> BootReport {
        let decision = self.settle();
        BootReport {
            host,
            verification: self.gate.state(),
            session: self.session.state(),
            callback,
            path: self.navigator.path(),
            decision,
        }
    }
}
