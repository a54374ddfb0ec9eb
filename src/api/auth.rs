//! Client wrappers for the backend's session endpoints.

use super::{ApiClient, Auth};
use crate::errors::AppError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

pub const REFRESH_TOKEN_PATH: &str = "/api/refresh-token";
pub const SESSION_LOGOUT_PATH: &str = "/api/session/logout";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenPayload {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// The backend answers either bare or inside its `{ data: ... }` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum RefreshTokenResponse {
    Wrapped { data: RefreshTokenPayload },
    Bare(RefreshTokenPayload),
}

impl RefreshTokenResponse {
    fn into_payload(self) -> RefreshTokenPayload {
        match self {
            RefreshTokenResponse::Wrapped { data } => data,
            RefreshTokenResponse::Bare(payload) => payload,
        }
    }
}

/// Credentials returned by a successful renewal.
pub struct RenewedTokens {
    pub access_token: SecretString,
    /// Present when the backend rotated the refresh token.
    pub refresh_token: Option<SecretString>,
}

/// Exchanges a refresh token for a new credential.
///
/// # Errors
///
/// Returns `AppError` on network failure, non-success status, or when the
/// response carries no `accessToken`.
#[instrument(skip(api, refresh_token))]
pub async fn refresh_token(
    api: &ApiClient,
    refresh_token: &SecretString,
) -> Result<RenewedTokens, AppError> {
    let request = RefreshTokenRequest {
        refresh_token: refresh_token.expose_secret(),
    };
    let response: RefreshTokenResponse = api
        .post_json(REFRESH_TOKEN_PATH, &request, Auth::Anonymous)
        .await?;
    let payload = response.into_payload();

    let access_token = payload
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Parse("Renewal response carried no access token.".to_string()))?;

    Ok(RenewedTokens {
        access_token: SecretString::from(access_token),
        refresh_token: payload
            .refresh_token
            .filter(|token| !token.is_empty())
            .map(SecretString::from),
    })
}

/// Ends the current session on the server.
///
/// # Errors
///
/// Returns `AppError` on network failure or non-success status.
#[instrument(skip(api))]
pub async fn logout_session(api: &ApiClient) -> Result<(), AppError> {
    api.post_empty(SESSION_LOGOUT_PATH, Auth::Bearer).await
}
