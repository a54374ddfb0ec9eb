//! # AuthGuard (client session core)
//!
//! `authguard` is the authentication and session core of the AuthGuard admin
//! console. It sits between the browser shell and the REST backend and owns
//! everything that decides *who* is using the console and *what* may be
//! rendered for them.
//!
//! ## Boot sequence
//!
//! 1. **Human verification:** the [`verify::HumanVerificationGate`] checks the
//!    cached verification credential (or the local-development bypass). Until it
//!    reports `Verified`, only the challenge screen is rendered.
//! 2. **Session:** the [`session::AuthContext`] reads the stored access
//!    credential, derives the user view and schedules a renewal 30 seconds before
//!    the credential expires.
//! 3. **OAuth2 callback:** when the page URL carries `token`/`refreshToken` or
//!    `error`, the callback handler stores the pair or surfaces the error.
//! 4. **Routing:** [`routes::decide`] maps `(verified, authenticated, path,
//!    roles)` to a render decision on every path or session change.
//!
//! ## Boundaries
//!
//! Credentials are decoded but never verified here; signature checks belong to
//! the backend. Storage, navigation, notifications and the challenge widget are
//! traits so the core can run natively (tests, the `authguard` driver) or be
//! bound to a browser runtime. Token material must never be logged.

pub mod api;
pub mod app;
pub mod cli;
pub mod clock;
pub mod config;
pub mod errors;
pub mod routes;
pub mod session;
pub mod shell;
pub mod storage;
pub mod token;
pub mod verify;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

pub use app::{App, BootReport, Challenge, Shell};
pub use config::AppConfig;
pub use errors::AppError;
pub use routes::{decide, GuardInput, Route, RouteDecision};
pub use session::{AuthContext, SessionState, UserView};
pub use verify::{HumanVerificationGate, VerificationState};
