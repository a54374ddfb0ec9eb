//! Build-time configuration for the backend and the challenge widget with an
//! optional runtime override. Runtime values come from the process environment
//! so a packaged client can be pointed at another backend without rebuilding.
//! Configuration values are public; do not store secrets here.

use crate::errors::AppError;
use url::Url;

pub const ENV_BASE_URL: &str = "AUTHGUARD_BASE_URL";
pub const ENV_TURNSTILE_SITEKEY: &str = "AUTHGUARD_TURNSTILE_SITEKEY";

/// Client configuration derived from build-time environment variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub turnstile_site_key: String,
}

impl AppConfig {
    /// Loads config from build-time environment variables and applies runtime overrides.
    #[must_use]
    pub fn load() -> Self {
        let api_base_url = option_env!("AUTHGUARD_BASE_URL").unwrap_or("");
        let turnstile_site_key = option_env!("AUTHGUARD_TURNSTILE_SITEKEY").unwrap_or("");

        let mut config = Self {
            api_base_url: api_base_url.to_string(),
            turnstile_site_key: turnstile_site_key.to_string(),
        };

        apply_runtime_overrides(&mut config, runtime_config());

        config
    }

    /// Parses the backend base URL.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the URL is missing or not absolute.
    pub fn base_url(&self) -> Result<Url, AppError> {
        let trimmed = self.api_base_url.trim();
        if trimmed.is_empty() {
            return Err(AppError::Config(
                "Backend base URL is not configured.".to_string(),
            ));
        }
        Url::parse(trimmed)
            .map_err(|err| AppError::Config(format!("Invalid backend base URL: {err}")))
    }
}

#[derive(Default)]
struct RuntimeConfig {
    api_base_url: Option<String>,
    turnstile_site_key: Option<String>,
}

fn apply_runtime_overrides(config: &mut AppConfig, runtime: RuntimeConfig) {
    if let Some(value) = runtime.api_base_url {
        config.api_base_url = value;
    }
    if let Some(value) = runtime.turnstile_site_key {
        config.turnstile_site_key = value;
    }
}

fn runtime_config() -> RuntimeConfig {
    RuntimeConfig {
        api_base_url: read_runtime_value(ENV_BASE_URL),
        turnstile_site_key: read_runtime_value(ENV_TURNSTILE_SITEKEY),
    }
}

fn read_runtime_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .and_then(|value| normalize_runtime_value(&value))
}

fn normalize_runtime_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
