//! HTTP helpers for the backend's JSON APIs with consistent timeouts and error
//! handling. Feature clients use these helpers to avoid duplicating request
//! setup and to keep error messages uniform. The helpers attach the stored
//! credential as a bearer token when asked to, and never log it.

pub mod auth;
pub mod branches;
mod cache;

pub use cache::ResponseCache;

use crate::{errors::AppError, token::TokenStore, APP_USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Default request timeout applied to every call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters surfaced to the UI.
const MAX_ERROR_CHARS: usize = 200;

/// Whether a request carries the stored credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Auth {
    Anonymous,
    Bearer,
}

/// Backend client shared by the session controller, the verification gate and
/// feature code.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    tokens: TokenStore,
    cache: ResponseCache,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be initialized.
    pub fn new(base_url: Url, tokens: TokenStore) -> Result<Self, AppError> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| AppError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url,
            tokens,
            cache: ResponseCache::default(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Cached GET responses; cleared on logout.
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Builds an absolute URL from the base URL and `path`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        build_url_with_base(self.base_url.as_str(), path)
    }

    /// Posts JSON and parses a JSON response.
    ///
    /// # Errors
    ///
    /// Returns `AppError` on network failure, non-success status or an
    /// undecodable body.
    #[instrument(skip(self, body))]
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        auth: Auth,
    ) -> Result<T, AppError> {
        let request = self.request(Method::POST, path, auth).json(body);
        let response = send(request).await?;
        handle_json_response(response).await
    }

    /// Posts without a body and ignores the response body.
    ///
    /// # Errors
    ///
    /// Returns `AppError` on network failure or non-success status.
    #[instrument(skip(self))]
    pub async fn post_empty(&self, path: &str, auth: Auth) -> Result<(), AppError> {
        let response = send(self.request(Method::POST, path, auth)).await?;
        handle_empty_response(response).await
    }

    /// Fetches JSON, serving repeated reads from the response cache.
    ///
    /// # Errors
    ///
    /// Returns `AppError` on network failure, non-success status or an
    /// undecodable body.
    #[instrument(skip(self))]
    pub async fn get_json_cached<T: DeserializeOwned>(
        &self,
        path: &str,
        auth: Auth,
    ) -> Result<T, AppError> {
        if let Some(value) = self.cache.get(path) {
            debug!("serving cached response");
            return parse_value(value);
        }

        let response = send(self.request(Method::GET, path, auth)).await?;
        let value: Value = handle_json_response(response).await?;
        self.cache.insert(path, value.clone());
        parse_value(value)
    }

    fn request(&self, method: Method, path: &str, auth: Auth) -> RequestBuilder {
        let builder = self.http.request(method, self.endpoint(path));
        match (auth, self.tokens.access_token()) {
            (Auth::Bearer, Some(token)) => builder.bearer_auth(token.expose_secret()),
            _ => builder,
        }
    }
}

/// Builds a URL from an explicit base URL and the provided path.
fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

async fn send(request: RequestBuilder) -> Result<Response, AppError> {
    request.send().await.map_err(AppError::from)
}

fn parse_value<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
    serde_json::from_value(value)
        .map_err(|err| AppError::Parse(format!("Failed to decode response: {err}")))
}

/// Parses JSON responses and surfaces HTTP errors with extracted messages.
async fn handle_json_response<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| AppError::Parse(format!("Failed to decode response: {err}")))
    } else {
        Err(http_error(response).await)
    }
}

async fn handle_empty_response(response: Response) -> Result<(), AppError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(http_error(response).await)
    }
}

async fn http_error(response: Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    AppError::Http {
        status: status.as_u16(),
        message: error_message(status, &body),
    }
}

/// Best-effort message: JSON `message`, else the raw body, else the status line.
fn error_message(status: StatusCode, body: &str) -> String {
    let status_line = || {
        status
            .canonical_reason()
            .unwrap_or("Request failed.")
            .to_string()
    };
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status_line();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(json) => json
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map_or_else(status_line, truncate),
        Err(_) => truncate(trimmed),
    }
}

fn truncate(message: &str) -> String {
    message.chars().take(MAX_ERROR_CHARS).collect()
}
