//! OAuth2 redirect handling.
//!
//! The backend finishes the Google flow by redirecting back with either
//! `?token=..&refreshToken=..` or `?error=<code>`.

use super::{AuthContext, SessionState, UserView, DASHBOARD_ROUTE, HOME_ROUTE, LOGIN_ROUTE};
use crate::shell::Notification;
use crate::token::{CredentialClaims, ROLE_ADMIN};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{error, info, warn};
use url::Url;

pub const LOGIN_ERROR_TITLE: &str = "Lỗi đăng nhập";
pub const CALLBACK_FAILURE_TITLE: &str = "Lỗi";
pub const CALLBACK_FAILURE_MESSAGE: &str = "Có lỗi xảy ra khi xử lý đăng nhập";

const KNOWN_ERRORS: [(&str, &str); 4] = [
    (
        "Email_not_allowed_for_selected_branch",
        "Email không được phép cho chi nhánh đã chọn",
    ),
    ("Branch_not_found", "Chi nhánh không tồn tại"),
    (
        "Branch_parameter_required",
        "Vui lòng chọn chi nhánh trước khi đăng nhập",
    ),
    ("OAuth2_authentication_failed", "Xác thực Google thất bại"),
];

/// User-facing message for a callback error code. Unknown codes are shown
/// with underscores turned into spaces.
#[must_use]
pub fn error_message_for(code: &str) -> String {
    KNOWN_ERRORS
        .iter()
        .find(|(known, _)| *known == code)
        .map_or_else(|| code.replace('_', " "), |(_, message)| (*message).to_string())
}

/// Redirect parameters found on the current location.
#[derive(Debug)]
pub enum CallbackParams {
    Error(String),
    Tokens {
        token: SecretString,
        refresh_token: SecretString,
    },
}

impl CallbackParams {
    /// `error` wins over tokens; a credential without its refresh token is
    /// not a callback.
    #[must_use]
    pub fn from_url(url: &Url) -> Option<Self> {
        let mut error = None;
        let mut token = None;
        let mut refresh_token = None;
        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "error" => error = Some(value.into_owned()),
                "token" => token = Some(value.into_owned()),
                "refreshToken" => refresh_token = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(code) = error {
            return Some(Self::Error(code));
        }
        match (token, refresh_token) {
            (Some(token), Some(refresh_token)) => Some(Self::Tokens {
                token: SecretString::from(token),
                refresh_token: SecretString::from(refresh_token),
            }),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackOutcome {
    NotACallback,
    Rejected { code: String, message: String },
    SignedIn { landing: String },
    Failed,
}

impl AuthContext {
    /// Processes OAuth2 redirect parameters on the current location, if any.
    pub fn handle_oauth_callback(&self) -> CallbackOutcome {
        let location = self.inner.navigator.location();
        self.handle_oauth_callback_at(&location)
    }

    /// Processes redirect parameters of `location`, the page the client was
    /// loaded on. Navigation done since then (a logout of a stale session)
    /// does not drop them.
    pub fn handle_oauth_callback_at(&self, location: &Url) -> CallbackOutcome {
        match CallbackParams::from_url(location) {
            None => CallbackOutcome::NotACallback,
            Some(CallbackParams::Error(code)) => self.reject_login(code),
            Some(CallbackParams::Tokens {
                token,
                refresh_token,
            }) => self.complete_login(location, &token, &refresh_token),
        }
    }

    fn reject_login(&self, code: String) -> CallbackOutcome {
        let message = error_message_for(&code);
        warn!(code = %code, "Login rejected by backend");
        self.inner
            .notifier
            .notify(Notification::destructive(LOGIN_ERROR_TITLE, message.clone()));
        self.inner.navigator.replace(LOGIN_ROUTE);
        CallbackOutcome::Rejected { code, message }
    }

    fn complete_login(
        &self,
        location: &Url,
        token: &SecretString,
        refresh_token: &SecretString,
    ) -> CallbackOutcome {
        if let Err(err) = self
            .inner
            .tokens
            .set_pair(token.expose_secret(), refresh_token.expose_secret())
        {
            error!("Failed to persist login credential: {err}");
            return self.fail_login();
        }

        let claims = match CredentialClaims::parse(token.expose_secret()) {
            Ok(claims) => claims,
            Err(err) => {
                warn!("Login credential is unreadable: {err}");
                return self.fail_login();
            }
        };

        self.inner
            .publish(SessionState::Authenticated(UserView::from_claims(&claims)));
        self.inner.navigator.replace(location.path());
        self.schedule_renewal(token, &claims);

        if !self.is_authenticated() {
            // the refresh window had already closed and logout took over
            return CallbackOutcome::Failed;
        }

        let landing = if claims.has_role(ROLE_ADMIN) {
            DASHBOARD_ROUTE
        } else {
            HOME_ROUTE
        };
        info!(landing, "Signed in");
        self.inner.navigator.navigate(landing);
        CallbackOutcome::SignedIn {
            landing: landing.to_string(),
        }
    }

    fn fail_login(&self) -> CallbackOutcome {
        self.inner.notifier.notify(Notification::destructive(
            CALLBACK_FAILURE_TITLE,
            CALLBACK_FAILURE_MESSAGE,
        ));
        self.inner.navigator.navigate(LOGIN_ROUTE);
        CallbackOutcome::Failed
    }
}
