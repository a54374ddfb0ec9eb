//! Maps validated CLI matches to an action, layering flags over the loaded
//! client configuration.

use crate::cli::actions::{boot::Args, Action};
use crate::cli::commands::{
    ARG_BASE_URL, ARG_CHALLENGE_TOKEN, ARG_SITE_KEY, ARG_STORE, ARG_URL, ARG_WATCH,
};
use crate::config::AppConfig;
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let mut config = AppConfig::load();
    if let Some(base_url) = matches.get_one::<String>(ARG_BASE_URL) {
        config.api_base_url.clone_from(base_url);
    }
    if let Some(site_key) = matches.get_one::<String>(ARG_SITE_KEY) {
        config.turnstile_site_key.clone_from(site_key);
    }
    config
        .base_url()
        .context("missing or invalid --base-url (AUTHGUARD_BASE_URL)")?;

    let store = matches
        .get_one::<String>(ARG_STORE)
        .map(PathBuf::from)
        .context("missing required argument: --store")?;
    let page_url = matches
        .get_one::<url::Url>(ARG_URL)
        .cloned()
        .context("missing required argument: --url")?;
    let challenge_token = matches
        .get_one::<String>(ARG_CHALLENGE_TOKEN)
        .cloned()
        .map(SecretString::from);

    Ok(Action::Boot(Args {
        config,
        store,
        page_url,
        challenge_token,
        watch: matches.get_flag(ARG_WATCH),
    }))
}
