//! Proactive credential renewal.
//!
//! One timer slot per session. Scheduling aborts whatever is pending before
//! arming a new timer; a firing timer takes itself out of the slot before it
//! touches the network, so a reschedule triggered meanwhile never aborts the
//! running renewal. Failures degrade to logout; there is no retry.

use super::{AuthContext, Inner};
use crate::api::auth;
use crate::token::CredentialClaims;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Seconds before expiry at which renewal fires.
pub const RENEWAL_MARGIN_SECS: i64 = 30;
/// Floor for the renewal delay, so an almost expired credential still renews.
pub const MIN_RENEWAL_DELAY_SECS: u64 = 1;

/// `max(exp - now - 30, 1)` seconds.
#[must_use]
pub fn renewal_delay(exp: i64, now: i64) -> Duration {
    let remaining = exp.saturating_sub(now).saturating_sub(RENEWAL_MARGIN_SECS);
    let secs = u64::try_from(remaining).unwrap_or(0);
    Duration::from_secs(secs.max(MIN_RENEWAL_DELAY_SECS))
}

struct PendingRenewal {
    generation: u64,
    credential: SecretString,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub(super) struct RenewalSlot {
    pending: Option<PendingRenewal>,
    generation: u64,
}

impl RenewalSlot {
    pub(super) fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
            debug!(generation = pending.generation, "Pending renewal cancelled");
        }
    }

    fn is_pending_for(&self, credential: &SecretString) -> bool {
        self.pending.as_ref().is_some_and(|pending| {
            !pending.handle.is_finished()
                && pending.credential.expose_secret() == credential.expose_secret()
        })
    }

    /// Removes the pending entry if it still belongs to `generation`.
    fn detach(&mut self, generation: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.generation == generation => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl AuthContext {
    /// True while a renewal timer is armed.
    #[must_use]
    pub fn has_pending_renewal(&self) -> bool {
        self.inner
            .renewal()
            .pending
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }

    /// Number of renewal timers armed so far.
    #[must_use]
    pub fn renewals_scheduled(&self) -> u64 {
        self.inner.renewal().generation
    }

    pub(super) fn schedule_renewal(&self, credential: &SecretString, claims: &CredentialClaims) {
        let (Some(exp), Some(refresh_expires_at)) = (claims.exp, claims.refresh_expires_at())
        else {
            debug!("Credential carries no expiry; renewal not scheduled");
            return;
        };

        let now = self.inner.clock.now();
        if now > refresh_expires_at {
            info!("Refresh window has closed; logging out");
            self.logout();
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("Renewal needs a tokio runtime; credential will not be renewed");
            return;
        };

        let mut slot = self.inner.renewal();
        if slot.is_pending_for(credential) {
            debug!("Renewal already pending for this credential");
            return;
        }
        slot.cancel();

        slot.generation += 1;
        let generation = slot.generation;
        let delay = renewal_delay(exp, now);
        let weak = self.downgrade();

        let handle = runtime.spawn(async move {
            sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                fire(inner, generation).await;
            }
        });

        slot.pending = Some(PendingRenewal {
            generation,
            credential: credential.clone(),
            handle,
        });
        debug!(
            generation,
            next_renew_seconds = delay.as_secs(),
            "Renewal scheduled"
        );
    }
}

async fn fire(inner: Arc<Inner>, generation: u64) {
    if !inner.renewal().detach(generation) {
        return;
    }
    let session = AuthContext::from_inner(inner);
    let tokens = session.tokens();

    let Some(refresh_token) = tokens.refresh_token() else {
        info!("No refresh token stored; logging out");
        session.logout();
        return;
    };

    let refresh_expires_at = tokens
        .access_token()
        .and_then(|token| CredentialClaims::parse(token.expose_secret()).ok())
        .and_then(|claims| claims.refresh_expires_at());
    match refresh_expires_at {
        Some(deadline) if session.inner.clock.now() <= deadline => {}
        Some(_) => {
            info!("Refresh window has closed; logging out");
            session.logout();
            return;
        }
        None => {
            warn!("Stored credential cannot be renewed; logging out");
            session.logout();
            return;
        }
    }

    let result = auth::refresh_token(session.api(), &refresh_token).await;

    let unchanged = tokens
        .refresh_token()
        .is_some_and(|current| current.expose_secret() == refresh_token.expose_secret());
    if !unchanged {
        info!("Session changed while renewing; discarding renewal outcome");
        return;
    }

    let renewed = match result {
        Ok(renewed) => renewed,
        Err(err) => {
            warn!("Credential renewal failed: {err}");
            session.logout();
            return;
        }
    };

    let next_refresh = renewed.refresh_token.as_ref().unwrap_or(&refresh_token);
    if let Err(err) = tokens.set_pair(
        renewed.access_token.expose_secret(),
        next_refresh.expose_secret(),
    ) {
        error!("Failed to persist renewed credential: {err}");
        session.logout();
        return;
    }

    info!(generation, "Credential renewed");
    session.resync();
}

#[cfg(test)]
mod tests {
    use super::{renewal_delay, RenewalSlot};
    use std::time::Duration;

    #[test]
    fn delay_fires_thirty_seconds_early() {
        assert_eq!(renewal_delay(1_000 + 900, 1_000), Duration::from_secs(870));
        assert_eq!(renewal_delay(1_000 + 31, 1_000), Duration::from_secs(1));
    }

    #[test]
    fn delay_never_drops_below_one_second() {
        assert_eq!(renewal_delay(1_000 + 30, 1_000), Duration::from_secs(1));
        assert_eq!(renewal_delay(1_000 + 5, 1_000), Duration::from_secs(1));
        assert_eq!(renewal_delay(900, 1_000), Duration::from_secs(1));
        assert_eq!(renewal_delay(i64::MIN, i64::MAX), Duration::from_secs(1));
    }

    #[test]
    fn empty_slot_ignores_cancel_and_detach() {
        let mut slot = RenewalSlot::default();
        slot.cancel();
        assert!(!slot.detach(1));
        assert_eq!(slot.generation, 0);
    }
}
